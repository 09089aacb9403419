pub mod client;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use client::{ByteStream, CompletionClient, TokenSource};
pub use stream::{feed, DecodeError, Feed, StreamDecoder, FRAME_PREFIX};
