use std::sync::Arc;

use crate::config::Config;
use crate::cv::extract::DocumentExtractor;
use crate::llm_client::InferenceClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup and shared by every request. Swap for a fake in tests.
    pub inference: Arc<dyn InferenceClient>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub config: Config,
}
