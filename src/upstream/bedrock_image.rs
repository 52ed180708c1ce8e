use crate::{
    config::BedrockConfig,
    error::{PipelineError, Result},
    models::{decode_image_payload, TitanImageResponse},
    upstream::{truncate_chars, ImageBackend},
};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::{error::ProvideErrorMetadata, primitives::Blob, Client};
use serde_json::json;
use std::time::Duration;

// Titan rejects longer text prompts.
const MAX_PROMPT_CHARS: usize = 512;
const TITAN_IMAGE_PREFIX: &str = "amazon.titan-image-generator";

/// Amazon Titan image generation through AWS Bedrock.
#[derive(Clone)]
pub struct BedrockImageBackend {
    client: Client,
    model_id: String,
    timeout: Duration,
}

impl BedrockImageBackend {
    pub async fn new(config: &BedrockConfig, timeout: Duration) -> Result<Self> {
        if !config.image_model.starts_with(TITAN_IMAGE_PREFIX) {
            return Err(PipelineError::Config(format!(
                "Unsupported Bedrock image model: {}",
                config.image_model
            )));
        }

        let (access_key, secret_key) = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => (access_key, secret_key),
            _ => {
                return Err(PipelineError::Config(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required for Bedrock".into(),
                ))
            }
        };

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(aws_sdk_bedrockruntime::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "threadsmith",
            ))
            .region(aws_sdk_bedrockruntime::config::Region::new(
                config
                    .region
                    .clone()
                    .unwrap_or_else(|| "us-east-1".to_string()),
            ))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&aws_config),
            model_id: config.image_model.clone(),
            timeout,
        })
    }

    fn build_request_payload(&self, prompt: &str) -> serde_json::Value {
        json!({
            "taskType": "TEXT_IMAGE",
            "textToImageParams": {
                "text": truncate_chars(prompt, MAX_PROMPT_CHARS)
            },
            "imageGenerationConfig": {
                "numberOfImages": 1,
                "width": 1024,
                "height": 1024,
                "quality": "standard",
                "cfgScale": 8.0
            }
        })
    }
}

#[async_trait]
impl ImageBackend for BedrockImageBackend {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let request_json = serde_json::to_string(&self.build_request_payload(prompt))
            .map_err(|e| PipelineError::Image(e.to_string()))?;

        log::info!("Generating image with model: {}", self.model_id);

        let call = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_json.into_bytes()))
            .send();

        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| PipelineError::Image("Bedrock request timed out".into()))?
            .map_err(|e| {
                log::error!("Bedrock image generation error: {}", e);
                match e.as_service_error() {
                    Some(service_error) => PipelineError::Image(format!(
                        "Bedrock service error: {} - {}",
                        service_error.code().unwrap_or("unknown"),
                        service_error.message().unwrap_or("no message")
                    )),
                    None => PipelineError::Image(format!("Bedrock request failed: {}", e)),
                }
            })?;

        let response_bytes = response.body.into_inner();
        let titan_response: TitanImageResponse = serde_json::from_slice(&response_bytes)
            .map_err(|_| PipelineError::Image("non-JSON response".into()))?;

        let first = titan_response
            .images
            .first()
            .ok_or_else(|| PipelineError::Image("No images generated".into()))?;

        decode_image_payload(first)
    }
}
