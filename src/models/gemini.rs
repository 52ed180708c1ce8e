//! Gemini `generateContent` payload types shared by the text and image clients.

use serde::Deserialize;

/// Top-level response envelope. Every field is optional upstream, so every
/// level decodes with defaults and callers branch on what is present.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: String,
}

/// Conventional `{"error": {"message": ...}}` body returned on failures.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, `None` when the
    /// candidate carries no text part at all.
    pub fn first_text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    /// First inline image payload across all candidates.
    pub fn first_inline_image(&self) -> Option<&InlineData> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| !d.data.is_empty())
    }
}

impl ErrorEnvelope {
    pub fn message(body: &serde_json::Value) -> Option<String> {
        serde_json::from_value::<ErrorEnvelope>(body.clone())
            .ok()?
            .error?
            .message
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        }))
        .unwrap();
        assert_eq!(response.first_text().as_deref(), Some("Hello, world"));
    }

    #[test]
    fn test_missing_levels_yield_none() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{}] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
        ] {
            let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
            assert!(response.first_text().is_none());
        }
    }

    #[test]
    fn test_inline_image_lookup() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
            ] } }]
        }))
        .unwrap();
        let image = response.first_inline_image().unwrap();
        assert_eq!(image.data, "iVBORw==");
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = json!({ "error": { "code": 429, "message": "Quota exceeded" } });
        assert_eq!(ErrorEnvelope::message(&body).as_deref(), Some("Quota exceeded"));
        assert_eq!(ErrorEnvelope::message(&json!({ "error": "flat" })), None);
        assert_eq!(ErrorEnvelope::message(&json!([1, 2])), None);
    }
}
