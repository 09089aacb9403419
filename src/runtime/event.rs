use bytes::Bytes;

/// Messages from a streaming task back to the session owner.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Chunk { request_id: u64, bytes: Bytes },
    Finished { request_id: u64 },
    Failed { request_id: u64, error: String },
}

impl RuntimeEvent {
    pub fn request_id(&self) -> u64 {
        match self {
            Self::Chunk { request_id, .. }
            | Self::Finished { request_id }
            | Self::Failed { request_id, .. } => *request_id,
        }
    }
}

/// Effect of one event on the session, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    Tokens(Vec<String>),
    Finished,
    Failed(String),
    /// The event belonged to a superseded or aborted request.
    Ignored,
}
