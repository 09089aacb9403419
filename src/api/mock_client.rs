use crate::api::client::{ByteStream, TokenSource};
use anyhow::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays scripted responses, one per `open_stream` call.
///
/// Each response is a list of raw chunks delivered in order. Chunks are sent
/// verbatim (no framing is added) so tests can split frames anywhere.
#[derive(Clone, Default)]
pub struct MockCompletionClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    chunk_delay: Option<Duration>,
}

impl MockCompletionClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    /// Delays every chunk, leaving room for a cancellation to land mid-stream.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

/// Formats one llama-server token frame.
pub fn token_frame(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "content": content, "stop": false })
    )
}

/// Final frame of a completion.
pub fn stop_frame() -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "content": "", "stop": true })
    )
}

impl TokenSource for MockCompletionClient {
    fn open_stream<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<ByteStream>> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }

            let chunks = {
                let mut responses = self
                    .responses
                    .lock()
                    .map_err(|_| anyhow::anyhow!("MockCompletionClient: response lock poisoned"))?;
                if responses.is_empty() {
                    return Err(anyhow::anyhow!(
                        "MockCompletionClient: No more responses configured"
                    ));
                }
                responses.remove(0)
            };

            let delay = self.chunk_delay;
            let byte_stream = stream::iter(chunks).then(move |chunk| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, anyhow::Error>(Bytes::from(chunk))
            });

            Ok(Box::pin(byte_stream) as ByteStream)
        })
    }
}
