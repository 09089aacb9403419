use super::logging::emit_frame_decode_error;
use crate::types::CompletionToken;
use thiserror::Error;

/// Every token frame is `data: <json>\n`.
pub const FRAME_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame at byte {offset} does not start with `{FRAME_PREFIX}`")]
    MissingPrefix { offset: usize, frame: String },
    #[error("frame at byte {offset} is not a valid token: {source}")]
    InvalidJson {
        offset: usize,
        frame: String,
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn frame(&self) -> &str {
        match self {
            Self::MissingPrefix { frame, .. } | Self::InvalidJson { frame, .. } => frame,
        }
    }
}

/// Outcome of one scan over the response buffer.
#[derive(Debug, Default)]
pub struct Feed {
    /// Offset just past the last complete frame; pass it to the next call.
    pub cursor: usize,
    pub tokens: Vec<String>,
    /// Frames that were skipped. Scanning always continues past them.
    pub errors: Vec<DecodeError>,
    /// Set once a frame reports `"stop": true`.
    pub stopped: bool,
}

/// Scans `buffer` from `cursor` and decodes every newline-terminated frame.
///
/// `buffer` is the whole response received so far. Bytes after the last
/// newline are an incomplete frame and are left for the next call, so
/// feeding the same buffer again with the returned cursor emits nothing new.
pub fn feed(buffer: &str, cursor: usize) -> Feed {
    scan_frames(buffer, cursor, 0)
}

fn scan_frames(buffer: &str, cursor: usize, base: usize) -> Feed {
    let mut out = Feed {
        cursor,
        ..Feed::default()
    };
    let Some(mut rest) = buffer.get(cursor..) else {
        return out;
    };

    while let Some(newline) = rest.find('\n') {
        let start = out.cursor;
        out.cursor += newline + 1;
        let line = &rest[..newline];
        rest = &rest[newline + 1..];

        if newline == 0 {
            continue;
        }

        let frame = line.strip_suffix('\r').unwrap_or(line);
        match decode_frame(frame, base + start) {
            Ok(Some(token)) => {
                out.stopped |= token.stop;
                out.tokens.push(token.content);
            }
            Ok(None) => {}
            Err(error) => out.errors.push(error),
        }
    }

    out
}

fn decode_frame(frame: &str, offset: usize) -> Result<Option<CompletionToken>, DecodeError> {
    if frame.trim().is_empty() || is_sse_control_line(frame) {
        return Ok(None);
    }

    let Some(payload) = frame.strip_prefix(FRAME_PREFIX) else {
        return Err(DecodeError::MissingPrefix {
            offset,
            frame: frame.to_string(),
        });
    };

    if payload.trim() == DONE_MARKER {
        return Ok(None);
    }

    serde_json::from_str::<CompletionToken>(payload)
        .map(Some)
        .map_err(|source| DecodeError::InvalidJson {
            offset,
            frame: frame.to_string(),
            source,
        })
}

fn is_sse_control_line(frame: &str) -> bool {
    frame.starts_with(':')
        || frame.starts_with("event:")
        || frame.starts_with("id:")
        || frame.starts_with("retry:")
}

/// Decoder state owned by one in-flight request.
///
/// Use [`StreamDecoder::push`] with raw network chunks, or
/// [`StreamDecoder::feed_whole`] when the transport hands over the whole
/// response text each time. Do not mix the two on one decoder.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: String,
    cursor: usize,
    consumed: usize,
    partial_utf8: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a network chunk and decodes every frame it completes.
    ///
    /// The returned cursor counts bytes consumed since the stream started.
    pub fn push(&mut self, chunk: &[u8]) -> Feed {
        self.append_utf8(chunk);

        let mut out = scan_frames(&self.buffer, 0, self.consumed);
        log_errors(&out);
        self.buffer.drain(..out.cursor);
        self.consumed += out.cursor;
        out.cursor = self.consumed;
        out
    }

    /// Decodes new frames from the whole response text received so far.
    pub fn feed_whole(&mut self, whole: &str) -> Feed {
        let out = feed(whole, self.cursor);
        log_errors(&out);
        self.cursor = out.cursor;
        out
    }

    pub fn cursor(&self) -> usize {
        self.cursor.max(self.consumed)
    }

    /// Takes whatever incomplete frame text is still buffered.
    pub fn flush(&mut self) -> String {
        self.partial_utf8.clear();
        std::mem::take(&mut self.buffer)
    }

    /// Decodes `chunk` after any bytes held back from the previous one.
    /// Invalid sequences become U+FFFD; only a trailing incomplete
    /// character is held back.
    fn append_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(error) => {
                    let (valid, tail) = rest.split_at(error.valid_up_to());
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match error.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[invalid..];
                        }
                        None => {
                            self.partial_utf8 = tail.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn log_errors(feed: &Feed) {
    for error in &feed.errors {
        emit_frame_decode_error(error);
    }
}
