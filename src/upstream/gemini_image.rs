use crate::{
    config::GeminiConfig,
    error::{PipelineError, Result},
    models::{decode_image_payload, gemini::GenerateContentResponse, PNG_MIME_TYPE},
    upstream::{image_response_json, text_client::gemini_endpoint, ImageBackend},
};
use async_trait::async_trait;
use serde_json::json;

/// Image generation through a Gemini model with image output modality.
#[derive(Clone)]
pub struct GeminiImageBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiImageBackend {
    pub fn new(http: reqwest::Client, config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::Config("GEMINI_API_KEY is not set".into()))?;

        Ok(Self {
            http,
            api_key,
            model: config.image_model.clone(),
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl ImageBackend for GeminiImageBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });

        log::info!("Generating image with model: {}", self.model);

        let response = self
            .http
            .post(gemini_endpoint(&self.base_url, &self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Image(format!("Gemini request failed: {}", e.without_url())))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Image(e.without_url().to_string()))?;

        let parsed = image_response_json(status, &body)?;
        let response: GenerateContentResponse = serde_json::from_value(parsed).unwrap_or_default();

        let inline = response
            .first_inline_image()
            .ok_or_else(|| PipelineError::Image("No images generated".into()))?;

        match inline.mime_type.as_deref() {
            Some(PNG_MIME_TYPE) | None => decode_image_payload(&inline.data),
            Some(other) => Err(PipelineError::Image(format!(
                "Unsupported image type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reads_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/image-model:generateContent"))
            .and(body_partial_json(
                json!({ "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] } }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "An image of a harbor" },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
                ] } }]
            })))
            .mount(&server)
            .await;

        let mut config = GeminiConfig::new().with_api_key("g").with_base_url(server.uri());
        config.image_model = "image-model".into();
        let backend = GeminiImageBackend::new(reqwest::Client::new(), &config).unwrap();

        assert_eq!(backend.generate_image("harbor").await.unwrap(), vec![137, 80, 78, 71]);
    }

    #[tokio::test]
    async fn test_non_png_part_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": "/9j/4A==" } }
                ] } }]
            })))
            .mount(&server)
            .await;

        let config = GeminiConfig::new().with_api_key("g").with_base_url(server.uri());
        let backend = GeminiImageBackend::new(reqwest::Client::new(), &config).unwrap();

        assert_eq!(
            backend.generate_image("harbor").await,
            Err(PipelineError::Image("Unsupported image type: image/jpeg".into()))
        );
    }

    #[tokio::test]
    async fn test_text_only_answer_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "I can't draw that" }] } }]
            })))
            .mount(&server)
            .await;

        let config = GeminiConfig::new().with_api_key("g").with_base_url(server.uri());
        let backend = GeminiImageBackend::new(reqwest::Client::new(), &config).unwrap();

        assert_eq!(
            backend.generate_image("x").await,
            Err(PipelineError::Image("No images generated".into()))
        );
    }
}
