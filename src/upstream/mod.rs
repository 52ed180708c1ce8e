pub mod bedrock_image;
pub mod gemini_image;
pub mod mock;
pub mod openai_image;
pub mod text_client;

use crate::{
    config::{Config, ImageBackendKind},
    error::{PipelineError, Result},
    models::{gemini::ErrorEnvelope, TextCallRequest, UpstreamTextResult},
};
use async_trait::async_trait;
use std::sync::Arc;

pub use bedrock_image::BedrockImageBackend;
pub use gemini_image::GeminiImageBackend;
pub use mock::{MockImageBackend, MockTextModel};
pub use openai_image::OpenAiImageBackend;
pub use text_client::GeminiTextClient;

/// A text-generation service. One call, one outbound request, no retries.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, request: &TextCallRequest) -> Result<UpstreamTextResult>;
}

/// An image-generation service turning a prompt into PNG bytes.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Shared HTTP client carrying the per-call timeout.
pub fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Builds the text model the configuration allows, `None` when its
/// credentials are missing.
pub fn text_model_from_config(
    config: &Config,
    http: &reqwest::Client,
) -> Option<Arc<dyn TextModel>> {
    if config.mock {
        return Some(Arc::new(MockTextModel::offline()));
    }
    config.gemini.api_key.as_ref()?;
    GeminiTextClient::new(http.clone(), &config.gemini)
        .ok()
        .map(|client| Arc::new(client) as Arc<dyn TextModel>)
}

/// Builds the configured image backend, `Ok(None)` when its credentials are
/// missing. Any other invalid backend setting is an error.
pub async fn image_backend_from_config(
    config: &Config,
    http: &reqwest::Client,
) -> Result<Option<Arc<dyn ImageBackend>>> {
    if config.mock {
        return Ok(Some(Arc::new(MockImageBackend::new())));
    }
    if config.missing_image_credentials().is_some() {
        return Ok(None);
    }

    let backend: Arc<dyn ImageBackend> = match config.image_backend {
        ImageBackendKind::Gemini => Arc::new(GeminiImageBackend::new(http.clone(), &config.gemini)?),
        ImageBackendKind::OpenAi => Arc::new(OpenAiImageBackend::new(http.clone(), &config.openai)?),
        ImageBackendKind::Bedrock => Arc::new(
            BedrockImageBackend::new(&config.bedrock, config.request_timeout).await?,
        ),
        ImageBackendKind::Mock => Arc::new(MockImageBackend::new()),
    };

    log::info!("Image backend ready: {}", backend.name());
    Ok(Some(backend))
}

/// Validates an image backend's HTTP answer: JSON first, then status.
pub(crate) fn image_response_json(status: u16, body: &str) -> Result<serde_json::Value> {
    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|_| PipelineError::Image("non-JSON response".into()))?;

    if !(200..300).contains(&status) {
        let message = ErrorEnvelope::message(&parsed)
            .unwrap_or_else(|| format!("upstream returned HTTP {}", status));
        return Err(PipelineError::Image(message));
    }

    Ok(parsed)
}

/// Cuts `text` to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
