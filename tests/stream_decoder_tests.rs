use avaron_aim::api::{feed, StreamDecoder};

const RESPONSE: &str = "data: {\"content\":\"Hé\",\"stop\":false}\n\n\
data: {\"content\":\"llo\",\"stop\":false}\n\n\
data: {\"content\":\"\",\"stop\":true,\"tokens_predicted\":2}\n\n";

#[test]
fn test_whole_buffer_feed_emits_each_token_once() {
    let first = "data: {\"content\":\"Hi\"}\n";
    let out = feed(first, 0);
    assert_eq!(out.tokens, vec!["Hi"]);

    let whole = "data: {\"content\":\"Hi\"}\ndata: {\"content\":\" there\"}\n";
    let out = feed(whole, out.cursor);
    assert_eq!(out.tokens, vec![" there"]);

    let out = feed(whole, out.cursor);
    assert!(out.tokens.is_empty());
}

#[test]
fn test_incomplete_frame_does_not_advance_cursor() {
    let out = feed("data: {\"content\":\"Hi\"", 0);
    assert!(out.tokens.is_empty());
    assert!(out.errors.is_empty());
    assert_eq!(out.cursor, 0);
}

#[test]
fn test_chunk_boundaries_do_not_change_tokens() {
    let bytes = RESPONSE.as_bytes();
    let expected = vec!["Hé".to_string(), "llo".to_string(), String::new()];

    for split in 0..=bytes.len() {
        let mut decoder = StreamDecoder::new();
        let head = decoder.push(&bytes[..split]);
        let tail = decoder.push(&bytes[split..]);
        let tokens: Vec<String> = head.tokens.into_iter().chain(tail.tokens).collect();

        assert_eq!(tokens, expected, "split at byte {split}");
        assert!(head.stopped || tail.stopped);
        assert_eq!(decoder.cursor(), bytes.len());
    }
}

#[test]
fn test_malformed_frames_are_skipped() {
    let mut decoder = StreamDecoder::new();
    let out = decoder.push(b"data: {\"content\":\"a\"}\ndata: not json\ngarbage\ndata: {\"content\":\"b\"}\n");

    assert_eq!(out.tokens, vec!["a", "b"]);
    assert_eq!(out.errors.len(), 2);
    assert_eq!(out.errors[0].frame(), "data: not json");
    assert_eq!(out.errors[1].frame(), "garbage");
}
