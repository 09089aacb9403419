use super::state::ActiveRequest;
use super::ChatSession;
use crate::api::logging::emit_stale_update_dropped;
use crate::api::Feed;

/// What one update appended to the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamProgress {
    pub tokens: Vec<String>,
    /// Frames skipped because they could not be decoded.
    pub skipped_frames: usize,
    pub stopped: bool,
}

impl ChatSession {
    /// Feeds a raw network chunk for request `id`.
    ///
    /// Returns `None` without touching the transcript when `id` is not the
    /// live request (superseded, aborted or finished).
    pub fn apply_chunk(&mut self, id: u64, chunk: &[u8]) -> Option<StreamProgress> {
        let feed = self.live_request(id)?.decoder.push(chunk);
        Some(self.append_feed(feed))
    }

    /// Feeds the whole response text received so far for request `id`.
    pub fn apply_buffer(&mut self, id: u64, whole: &str) -> Option<StreamProgress> {
        let feed = self.live_request(id)?.decoder.feed_whole(whole);
        Some(self.append_feed(feed))
    }

    /// Marks request `id` complete. Returns false if it was not live.
    pub fn finish(&mut self, id: u64) -> bool {
        if self.live_request(id).is_none() {
            return false;
        }
        self.active = None;
        true
    }

    fn live_request(&mut self, id: u64) -> Option<&mut ActiveRequest> {
        let active_id = self.active_request_id();
        let live = self
            .active
            .as_mut()
            .filter(|active| active.id == id && !active.cancel.is_cancelled());
        if live.is_none() {
            emit_stale_update_dropped(id, active_id);
        }
        live
    }

    fn append_feed(&mut self, feed: Feed) -> StreamProgress {
        for token in &feed.tokens {
            self.transcript.push_str(token);
        }
        StreamProgress {
            tokens: feed.tokens,
            skipped_frames: feed.errors.len(),
            stopped: feed.stopped,
        }
    }
}
