use crate::{
    config::GeminiConfig,
    error::{PipelineError, Result},
    models::{
        gemini::{ErrorEnvelope, GenerateContentResponse},
        CallPurpose, ResponseFormat, TextCallRequest, UpstreamTextResult, CONTENT_NOT_FOUND,
    },
    upstream::TextModel,
};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Gemini `generateContent` client for text tasks.
#[derive(Clone)]
pub struct GeminiTextClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTextClient {
    pub fn new(http: reqwest::Client, config: &GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::Config("GEMINI_API_KEY is not set".into()))?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        gemini_endpoint(&self.base_url, &self.model)
    }

    fn build_request_payload(&self, request: &TextCallRequest) -> Value {
        let mut payload = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": request.prompt }]
                }
            ]
        });

        if let Some(instruction) = &request.system_instruction {
            payload["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }

        match request.options.response_format {
            ResponseFormat::Structured => {
                // Gemini rejects tool use combined with a response schema.
                if request.options.use_search {
                    log::debug!("Search disabled for structured {} call", request.purpose.as_str());
                }
                let mut generation_config = json!({ "responseMimeType": "application/json" });
                if let Some(schema) = &request.options.response_schema {
                    generation_config["responseSchema"] = schema.clone();
                }
                payload["generationConfig"] = generation_config;
            }
            ResponseFormat::Text => {
                if request.options.use_search {
                    payload["tools"] = json!([{ "googleSearch": {} }]);
                }
            }
        }

        payload
    }
}

pub(crate) fn gemini_endpoint(base_url: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{}", trimmed)
    };
    format!("{}/{}:generateContent", base_url, model_path)
}

#[async_trait]
impl TextModel for GeminiTextClient {
    async fn generate(&self, request: &TextCallRequest) -> Result<UpstreamTextResult> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::BadRequest("Prompt must not be empty".into()));
        }

        let payload = self.build_request_payload(request);
        log::info!(
            "Invoking model: {} ({} call)",
            self.model,
            request.purpose.as_str()
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                log::error!("Gemini request failed: {}", e);
                PipelineError::Transport(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(PipelineError::from)?;
        log::debug!("Gemini raw response ({}): {}", status, body);

        classify_text_response(status, &body, request.purpose)
    }
}

/// Maps a raw upstream answer onto a result. Checked in order: JSON
/// framing, HTTP status, presence of a text part.
pub fn classify_text_response(
    status: u16,
    body: &str,
    purpose: CallPurpose,
) -> Result<UpstreamTextResult> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if purpose.is_extraction() => {
            log::warn!("Non-JSON response on {} call, treating as not found", purpose.as_str());
            return Ok(UpstreamTextResult::new(CONTENT_NOT_FOUND));
        }
        Err(_) => return Err(PipelineError::Transport("non-JSON response".into())),
    };

    if !(200..300).contains(&status) {
        let message = ErrorEnvelope::message(&parsed)
            .unwrap_or_else(|| format!("upstream returned HTTP {}", status));
        return Err(PipelineError::Generation(message));
    }

    let response: GenerateContentResponse = serde_json::from_value(parsed).unwrap_or_default();
    match response.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(UpstreamTextResult::new(text)),
        _ => Err(PipelineError::Generation("no content returned".into())),
    }
}
