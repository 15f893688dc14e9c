//! AWS Bedrock backend (`InvokeModelWithResponseStream`).

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use bytes::Bytes;
use futures::{future, stream, Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use super::{FragmentStream, InferenceClient, InferenceError};
use crate::cv::prompt::PromptMessage;

const ANTHROPIC_BEDROCK_VERSION: &str = "bedrock-2023-05-31";

#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    messages: [&'a PromptMessage; 1],
}

/// Bedrock runtime client. Constructed once at startup; the SDK client is
/// internally reference counted so cloning is cheap.
#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
    model_id: String,
    max_tokens: u32,
}

impl BedrockClient {
    /// Loads AWS credentials from the default provider chain.
    pub async fn from_region(region: &str, model_id: String, max_tokens: u32) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
            model_id,
            max_tokens,
        }
    }

    fn request_body(&self, prompt: &PromptMessage) -> Result<Vec<u8>, InferenceError> {
        Ok(serde_json::to_vec(&InvokeBody {
            anthropic_version: ANTHROPIC_BEDROCK_VERSION,
            max_tokens: self.max_tokens,
            messages: [prompt],
        })?)
    }
}

#[async_trait]
impl InferenceClient for BedrockClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke_streaming(
        &self,
        prompt: &PromptMessage,
    ) -> Result<FragmentStream, InferenceError> {
        let body = self.request_body(prompt)?;
        debug!("Invoking Bedrock model {} ({} byte body)", self.model_id, body.len());

        let output = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| InferenceError::Invoke(DisplayErrorContext(&e).to_string()))?;

        // Each poll is one `recv`; `receive_fragments` stops polling at the end or first error.
        let received = stream::unfold(output.body, |mut receiver| async move {
            let received = receiver
                .recv()
                .await
                .map_err(|e| DisplayErrorContext(&e).to_string());
            Some((received, receiver))
        });

        Ok(receive_fragments(received))
    }
}

/// Adapts successive `recv` results into fragments. `Ok(None)` ends the
/// stream; an error is yielded once and then the stream ends.
fn receive_fragments<S, E>(received: S) -> FragmentStream
where
    S: Stream<Item = Result<Option<ResponseStream>, E>> + Send + 'static,
    E: std::fmt::Display,
{
    let fragments = received.scan(false, |failed, received| {
        let item = if *failed {
            None
        } else {
            match received {
                Ok(Some(event)) => Some(Ok(chunk_bytes(event))),
                Ok(None) => None,
                Err(e) => {
                    *failed = true;
                    Some(Err(InferenceError::Stream(e.to_string())))
                }
            }
        };
        future::ready(item)
    });

    Box::pin(fragments)
}

/// Payload bytes of a chunk event; non-chunk events carry nothing for the client.
fn chunk_bytes(event: ResponseStream) -> Bytes {
    match event {
        ResponseStream::Chunk(part) => part
            .bytes
            .map(|blob| Bytes::from(blob.into_inner()))
            .unwrap_or_default(),
        _ => Bytes::new(),
    }
}
