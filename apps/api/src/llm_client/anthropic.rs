//! Direct Anthropic Messages API backend, streamed over server-sent events.
//!
//! Each SSE event's `data` is the same JSON event Bedrock puts in a chunk,
//! so the relay decodes both backends identically.

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FragmentStream, InferenceClient, InferenceError};
use crate::cv::prompt::PromptMessage;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    stream: bool,
    messages: [&'a PromptMessage; 1],
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model_id: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, model_id: String, max_tokens: u32) -> Result<Self, InferenceError> {
        // No overall timeout: a streamed answer legitimately runs for minutes.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model_id,
            max_tokens,
        })
    }
}

#[async_trait]
impl InferenceClient for AnthropicClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke_streaming(
        &self,
        prompt: &PromptMessage,
    ) -> Result<FragmentStream, InferenceError> {
        let request_body = AnthropicRequest {
            model: &self.model_id,
            max_tokens: self.max_tokens,
            stream: true,
            messages: [prompt],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            });
        }

        debug!("Anthropic stream opened for model {}", self.model_id);

        Ok(sse_fragments(response.bytes_stream()))
    }
}

/// Frames a raw SSE byte stream into one fragment per event `data`,
/// regardless of how the bytes were split into chunks.
fn sse_fragments<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let fragments = body.eventsource().map(|event| match event {
        Ok(event) => Ok(Bytes::from(event.data)),
        Err(e) => Err(InferenceError::Stream(e.to_string())),
    });

    Box::pin(fragments)
}

/// Pulls the human-readable message out of an Anthropic error envelope,
/// falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
