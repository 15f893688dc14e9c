use anyhow::{bail, Context, Result};

const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

/// Which hosted endpoint serves inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceBackend {
    Bedrock,
    Anthropic,
}

/// What the client sees when the upstream model call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorMode {
    /// Close the response body early with no indication.
    Silent,
    /// Append a terminal marker line before closing.
    Marker,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a value is present but invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub backend: InferenceBackend,
    pub aws_region: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub anthropic_api_key: Option<String>,
    pub relay_on_error: RelayErrorMode,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("INFERENCE_BACKEND").as_deref() {
            None | Some("bedrock") => InferenceBackend::Bedrock,
            Some("anthropic") => InferenceBackend::Anthropic,
            Some(other) => bail!("INFERENCE_BACKEND must be 'bedrock' or 'anthropic', got '{other}'"),
        };

        let relay_on_error = match lookup("RELAY_ON_ERROR").as_deref() {
            None | Some("silent") => RelayErrorMode::Silent,
            Some("marker") => RelayErrorMode::Marker,
            Some(other) => bail!("RELAY_ON_ERROR must be 'silent' or 'marker', got '{other}'"),
        };

        let anthropic_api_key = lookup("ANTHROPIC_API_KEY");
        if backend == InferenceBackend::Anthropic && anthropic_api_key.is_none() {
            bail!("Required environment variable 'ANTHROPIC_API_KEY' is not set");
        }

        let model_id = lookup("MODEL_ID").unwrap_or_else(|| {
            match backend {
                InferenceBackend::Bedrock => DEFAULT_BEDROCK_MODEL,
                InferenceBackend::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            }
            .to_string()
        });

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            backend,
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-west-2".to_string()),
            model_id,
            max_tokens: parse_or(&lookup, "MAX_TOKENS", 2048u32)
                .context("MAX_TOKENS must be a positive integer")?,
            anthropic_api_key,
            relay_on_error,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value '{raw}' for {key}")),
        None => Ok(default),
    }
}
