use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PipelineError;

/// Phrase the extraction prompt asks for when a page has no body text.
pub const CONTENT_NOT_FOUND: &str = "Content not found";

/// Output contract requested from the text model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Unconstrained text.
    Text,
    /// JSON constrained by a declared response schema.
    Structured,
}

impl FromStr for ResponseFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "free" | "free-text" => Ok(ResponseFormat::Text),
            "structured" | "json" | "schema" => Ok(ResponseFormat::Structured),
            other => Err(PipelineError::Config(format!(
                "Unknown response format: {}",
                other
            ))),
        }
    }
}

/// Why a text call is made. Extraction calls degrade instead of failing
/// when the upstream framing is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Extraction,
    Summary,
    Thread { count: usize },
    ImagePrompt,
}

impl CallPurpose {
    pub fn is_extraction(&self) -> bool {
        matches!(self, CallPurpose::Extraction | CallPurpose::Summary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallPurpose::Extraction => "extraction",
            CallPurpose::Summary => "summary",
            CallPurpose::Thread { .. } => "thread",
            CallPurpose::ImagePrompt => "image-prompt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextCallOptions {
    pub use_search: bool,
    pub response_format: ResponseFormat,
    pub response_schema: Option<serde_json::Value>,
}

impl Default for TextCallOptions {
    fn default() -> Self {
        TextCallOptions {
            use_search: false,
            response_format: ResponseFormat::Text,
            response_schema: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextCallRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub options: TextCallOptions,
    pub purpose: CallPurpose,
}

impl TextCallRequest {
    pub fn new(prompt: impl Into<String>, purpose: CallPurpose) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            options: TextCallOptions::default(),
            purpose,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_search(mut self, enabled: bool) -> Self {
        self.options.use_search = enabled;
        self
    }

    pub fn with_structured_output(mut self, schema: serde_json::Value) -> Self {
        self.options.response_format = ResponseFormat::Structured;
        self.options.response_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTextResult {
    pub text: String,
}

impl UpstreamTextResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed().is_empty()
    }
}
