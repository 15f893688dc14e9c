/// LLM Client — the single point of entry for hosted model inference.
///
/// No other module talks to a model endpoint directly. Backends implement
/// `InferenceClient` and hand back a raw fragment stream; turning fragments
/// into text happens here (`decode_fragment`) so every backend behaves the same.
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::cv::prompt::PromptMessage;

pub mod anthropic;
pub mod bedrock;

/// Emitted in place of a fragment that could not be decoded.
pub const PLACEHOLDER: &str = " ";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invocation failed: {0}")]
    Invoke(String),

    #[error("response stream failed: {0}")]
    Stream(String),
}

/// Raw fragments in arrival order. An empty `Bytes` is a fragment with no payload.
pub type FragmentStream = BoxStream<'static, Result<Bytes, InferenceError>>;

#[async_trait]
pub trait InferenceClient: Send + Sync {
    fn model_id(&self) -> &str;

    /// Starts one streaming invocation. Errors here mean nothing was received.
    async fn invoke_streaming(&self, prompt: &PromptMessage)
        -> Result<FragmentStream, InferenceError>;
}

/// Streaming events of the Anthropic Messages protocol, as carried by both
/// Bedrock chunks and SSE `data:` payloads.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart,
    ContentBlockStart,
    ContentBlockDelta { delta: Delta },
    ContentBlockStop,
    MessageDelta,
    MessageStop,
    Ping,
    Error { error: ApiErrorBody },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Turns one raw fragment into client text.
///
/// - empty fragment: `None`
/// - undecodable fragment: `Some(PLACEHOLDER)`, so one bad fragment never ends the response
/// - text content delta: `Some(text)`
/// - anything else: `None`
pub fn decode_fragment(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    match serde_json::from_slice::<StreamEvent>(raw) {
        Ok(StreamEvent::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        }) => Some(text),
        Ok(StreamEvent::Error { error }) => {
            warn!("Model stream reported an error event: {}", error.message);
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Undecodable stream fragment ({} bytes): {e}", raw.len());
            Some(PLACEHOLDER.to_string())
        }
    }
}
