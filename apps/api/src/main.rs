mod config;
mod cv;
mod errors;
mod llm_client;
mod relay;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, InferenceBackend};
use crate::cv::extract::PdfTextExtractor;
use crate::llm_client::anthropic::AnthropicClient;
use crate::llm_client::bedrock::BedrockClient;
use crate::llm_client::InferenceClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on invalid values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the inference client once; every request shares it
    let inference = build_inference_client(&config).await?;
    info!(
        "Inference client initialized ({:?}, model: {})",
        config.backend,
        inference.model_id()
    );

    let state = AppState {
        inference,
        extractor: Arc::new(PdfTextExtractor),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_inference_client(config: &Config) -> Result<Arc<dyn InferenceClient>> {
    let client: Arc<dyn InferenceClient> = match config.backend {
        InferenceBackend::Bedrock => Arc::new(
            BedrockClient::from_region(&config.aws_region, config.model_id.clone(), config.max_tokens)
                .await,
        ),
        InferenceBackend::Anthropic => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ANTHROPIC_API_KEY is required for the anthropic backend"))?;
            Arc::new(AnthropicClient::new(
                api_key,
                config.model_id.clone(),
                config.max_tokens,
            )?)
        }
    };
    Ok(client)
}
