use crate::{
    config::OpenAiConfig,
    error::{PipelineError, Result},
    models::{decode_image_payload, OpenAiImageResponse},
    upstream::{image_response_json, truncate_chars, ImageBackend},
};
use async_trait::async_trait;
use serde_json::json;

const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Clone)]
pub struct OpenAiImageBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiImageBackend {
    pub fn new(http: reqwest::Client, config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::Config("OPENAI_API_KEY is not set".into()))?;

        Ok(Self {
            http,
            api_key,
            model: config.image_model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn build_request_payload(&self, prompt: &str) -> serde_json::Value {
        let mut payload = json!({
            "model": self.model,
            "prompt": truncate_chars(prompt, MAX_PROMPT_CHARS),
            "n": 1,
            "size": "1024x1024"
        });
        // gpt-image models always answer with base64 and reject the field.
        if !self.model.starts_with("gpt-image") {
            payload["response_format"] = json!("b64_json");
        }
        payload
    }
}

#[async_trait]
impl ImageBackend for OpenAiImageBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        log::info!("Generating image with model: {}", self.model);

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request_payload(prompt))
            .send()
            .await
            .map_err(|e| PipelineError::Image(format!("OpenAI request failed: {}", e.without_url())))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Image(e.without_url().to_string()))?;

        let parsed = image_response_json(status, &body)?;
        let images: OpenAiImageResponse = serde_json::from_value(parsed)
            .map_err(|e| PipelineError::Image(format!("Unexpected image response: {}", e)))?;

        let data = images
            .data
            .into_iter()
            .find_map(|datum| datum.b64_json)
            .ok_or_else(|| PipelineError::Image("No images generated".into()))?;

        decode_image_payload(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend_for(server: &MockServer) -> OpenAiImageBackend {
        let config = OpenAiConfig::new()
            .with_api_key("sk-test")
            .with_base_url(server.uri());
        OpenAiImageBackend::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn test_payload_depends_on_model() {
        let config = OpenAiConfig::new().with_api_key("sk");
        let mut backend = OpenAiImageBackend::new(reqwest::Client::new(), &config).unwrap();
        assert_eq!(backend.build_request_payload("cat")["response_format"], "b64_json");

        backend.model = "gpt-image-1".into();
        assert!(backend.build_request_payload("cat").get("response_format").is_none());
    }

    #[tokio::test]
    async fn test_decodes_first_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [{ "b64_json": "iVBORw==" }] })),
            )
            .mount(&server)
            .await;

        let bytes = backend_for(&server).await.generate_image("a lighthouse").await.unwrap();
        assert_eq!(bytes, vec![137, 80, 78, 71]);
    }

    #[tokio::test]
    async fn test_failures_are_image_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({ "error": { "message": "Your request was rejected by the safety system" } }),
            ))
            .mount(&server)
            .await;

        let err = backend_for(&server).await.generate_image("x").await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Image("Your request was rejected by the safety system".into())
        );
    }

    #[tokio::test]
    async fn test_empty_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = backend_for(&server).await.generate_image("x").await.unwrap_err();
        assert_eq!(err, PipelineError::Image("No images generated".into()));
    }
}
