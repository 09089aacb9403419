use crate::api::logging::emit_request_cancelled;
use crate::api::StreamDecoder;
use crate::transcript::{self, ProtocolError};
use crate::types::{RenderedTurn, Turn};
use tokio_util::sync::CancellationToken;

/// Handle for one streaming request, given to whoever drives the transport.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub id: u64,
    /// Full transcript to send, ending with the new user turn.
    pub prompt: String,
    /// Cancelled when the request is superseded or aborted.
    pub cancel: CancellationToken,
}

pub(super) struct ActiveRequest {
    pub(super) id: u64,
    pub(super) cancel: CancellationToken,
    pub(super) decoder: StreamDecoder,
}

/// A live conversation: the flat transcript plus at most one in-flight
/// completion request appending to it.
#[derive(Default)]
pub struct ChatSession {
    pub(super) transcript: String,
    pub(super) active: Option<ActiveRequest>,
    next_request_id: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes from an existing transcript, e.g. a health check log.
    pub fn from_transcript(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            ..Self::default()
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn turns(&self) -> Result<Vec<Turn>, ProtocolError> {
        transcript::decode(&self.transcript)
    }

    /// Re-parses the whole transcript. There is no incremental diffing.
    pub fn render(&self) -> Result<Vec<RenderedTurn>, ProtocolError> {
        transcript::render_transcript(&self.transcript)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_request_id(&self) -> Option<u64> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Appends a user turn and starts a new request for it.
    ///
    /// Any request still in flight is aborted first, so none of its tokens
    /// can land after the new user turn.
    pub fn submit(&mut self, input: &str) -> RequestTicket {
        self.abort();
        self.transcript.push_str(&transcript::user_turn(input));

        self.next_request_id += 1;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveRequest {
            id: self.next_request_id,
            cancel: cancel.clone(),
            decoder: StreamDecoder::new(),
        });

        RequestTicket {
            id: self.next_request_id,
            prompt: self.transcript.clone(),
            cancel,
        }
    }

    /// Cancels the in-flight request and drops its decoder state without
    /// flushing any partial frame. Returns whether a request was active.
    pub fn abort(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.cancel();
        emit_request_cancelled(active.id);
        true
    }

    /// Appends text as assistant output outside any request, e.g. the
    /// wrapped output of a shell command. Aborts an in-flight request first.
    pub fn append_assistant(&mut self, text: &str) {
        self.abort();
        self.transcript.push_str(text);
    }
}
