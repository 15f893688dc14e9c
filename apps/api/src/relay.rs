//! Stream relay: adapts an upstream fragment stream into the response body.
//!
//! The relay is a lazy, pull-driven state machine:
//!
//! ```text
//! Idle ──pull──▶ Invoking ──ok──▶ Streaming ──end──▶ Closed (normal)
//!                   │                 │
//!                   └──err──┬─────────┘
//!                           ▼
//!                    Closed (on error)
//! ```
//!
//! Nothing happens until the body is first polled, and each poll drives the
//! upstream stream only until the next text is ready. Fragments are relayed one
//! at a time in arrival order. If the client goes away the body is dropped,
//! which drops the upstream stream with it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use tracing::{error, info, Instrument, Span};

use crate::config::RelayErrorMode;
use crate::cv::prompt::PromptMessage;
use crate::llm_client::{decode_fragment, FragmentStream, InferenceClient, InferenceError};

/// Appended in `RelayErrorMode::Marker` when the upstream call fails.
pub const ERROR_MARKER: &str = "\n\n[response interrupted: upstream model error]\n";

enum RelayState {
    Idle {
        client: Arc<dyn InferenceClient>,
        prompt: PromptMessage,
    },
    Streaming {
        fragments: FragmentStream,
        relayed: usize,
    },
    Closed,
}

/// Lazily invokes the model and yields client text in arrival order.
/// Finite and not restartable; never yields an error.
/// Every step runs inside `span`.
pub fn relay(
    client: Arc<dyn InferenceClient>,
    prompt: PromptMessage,
    on_error: RelayErrorMode,
    span: Span,
) -> impl Stream<Item = String> + Send {
    let initial = RelayState::Idle { client, prompt };

    stream::unfold(initial, move |state| {
        next_text(state, on_error).instrument(span.clone())
    })
}

async fn next_text(state: RelayState, on_error: RelayErrorMode) -> Option<(String, RelayState)> {
    let mut state = state;
    loop {
        state = match state {
            RelayState::Closed => return None,
            RelayState::Idle { client, prompt } => {
                info!("Invoking model {}", client.model_id());
                match client.invoke_streaming(&prompt).await {
                    Ok(fragments) => {
                        info!("Model stream opened");
                        RelayState::Streaming {
                            fragments,
                            relayed: 0,
                        }
                    }
                    Err(e) => return close_on_error(e, 0, on_error),
                }
            }
            RelayState::Streaming {
                mut fragments,
                relayed,
            } => match fragments.next().await {
                None => {
                    info!("Model stream finished after {relayed} fragment(s)");
                    return None;
                }
                Some(Err(e)) => return close_on_error(e, relayed, on_error),
                Some(Ok(raw)) => match decode_fragment(&raw) {
                    Some(text) => {
                        let next = RelayState::Streaming {
                            fragments,
                            relayed: relayed + 1,
                        };
                        return Some((text, next));
                    }
                    None => RelayState::Streaming { fragments, relayed },
                },
            },
        };
    }
}

fn close_on_error(
    e: InferenceError,
    relayed: usize,
    on_error: RelayErrorMode,
) -> Option<(String, RelayState)> {
    error!("Model stream closed on error after {relayed} fragment(s): {e}");
    match on_error {
        RelayErrorMode::Silent => None,
        RelayErrorMode::Marker => Some((ERROR_MARKER.to_string(), RelayState::Closed)),
    }
}

/// Wraps the relay as a streaming response body, one chunk per text.
pub fn into_body(texts: impl Stream<Item = String> + Send + 'static) -> Body {
    Body::from_stream(texts.map(|text| Ok::<_, Infallible>(Bytes::from(text))))
}
