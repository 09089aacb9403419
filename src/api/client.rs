use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::types::CompletionRequest;
use crate::util::is_local_endpoint_url;
use anyhow::anyhow;
use anyhow::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Anything that can turn a transcript prompt into a stream of response
/// bytes. The engine never opens connections itself.
pub trait TokenSource: Send + Sync {
    fn open_stream<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<ByteStream>>;
}

/// Streaming client for a llama-server style `/completion` endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }

    pub fn request_for(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: prompt.to_string(),
            model: self.model.clone(),
            stream: true,
        }
    }

    pub async fn create_stream(&self, prompt: &str) -> Result<ByteStream> {
        let request_url = self.api_url.clone();
        let payload = self.request_for(prompt);

        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &serde_json::to_value(&payload)?);
        }

        let mut request = self
            .http
            .post(&request_url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_api_request_error(error, &request_url))?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
        });
        Ok(Box::pin(stream))
    }
}

impl TokenSource for CompletionClient {
    fn open_stream<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<ByteStream>> {
        Box::pin(self.create_stream(prompt))
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local completion endpoint '{}': {}. Start llama-server or update AIM_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach completion endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("completion request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "completion endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("completion request to '{}' failed: {}", request_url, error)
}
