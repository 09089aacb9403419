use serde::{Deserialize, Serialize};

/// Body posted to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub stream: bool,
}

/// Payload of one `data: ` frame from the completion stream.
///
/// Only `content` is required; llama-server also reports bookkeeping fields
/// which are kept when present.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompletionToken {
    pub content: String,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub tokens: Vec<i64>,
    #[serde(default, rename = "id_slot")]
    pub slot: Option<i64>,
    #[serde(default)]
    pub tokens_predicted: Option<u64>,
    #[serde(default)]
    pub tokens_evaluated: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_accepts_llama_server_frame() {
        let json = r#"{"index":0,"content":" I","tokens":[315],"stop":false,"id_slot":-1,"tokens_predicted":152,"tokens_evaluated":9}"#;
        let token: CompletionToken = serde_json::from_str(json).expect("frame parses");
        assert_eq!(token.content, " I");
        assert_eq!(token.slot, Some(-1));
        assert_eq!(token.tokens, vec![315]);
        assert!(!token.stop);
    }

    #[test]
    fn test_token_requires_content_only() {
        let token: CompletionToken =
            serde_json::from_str(r#"{"content":"x"}"#).expect("minimal frame parses");
        assert_eq!(token.content, "x");
        assert_eq!(token.tokens_predicted, None);

        assert!(serde_json::from_str::<CompletionToken>(r#"{"stop":true}"#).is_err());
    }

    #[test]
    fn test_request_serializes_stream_flag() {
        let request = CompletionRequest {
            prompt: "[INST]hi[/INST]".to_string(),
            model: "mixtral.gguf".to_string(),
            stream: true,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"prompt": "[INST]hi[/INST]", "model": "mixtral.gguf", "stream": true})
        );
    }
}
