//! Deterministic stand-ins for the upstream services, used by mock mode and tests.

use crate::{
    error::{PipelineError, Result},
    models::{
        decode_image_payload, CallPurpose, ResponseFormat, TextCallRequest, UpstreamTextResult,
    },
    upstream::{ImageBackend, TextModel},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A 1x1 transparent PNG.
pub const TINY_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

type Responder = Box<dyn Fn(&TextCallRequest) -> Result<String> + Send + Sync>;

pub struct MockTextModel {
    responder: Responder,
    calls: Mutex<Vec<TextCallRequest>>,
}

impl MockTextModel {
    pub fn new(responder: impl Fn(&TextCallRequest) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers calls with `responses` in order; extra calls fail.
    pub fn scripted(responses: Vec<Result<String>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .map_err(|_| PipelineError::Transport("mock script poisoned".into()))?
                .pop_front()
                .unwrap_or_else(|| Err(PipelineError::Transport("mock script exhausted".into())))
        })
    }

    /// Plausible canned answers for every call purpose.
    pub fn offline() -> Self {
        Self::new(offline_response)
    }

    pub fn calls(&self) -> Vec<TextCallRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

fn offline_response(request: &TextCallRequest) -> Result<String> {
    let text = match request.purpose {
        CallPurpose::Extraction | CallPurpose::Summary => {
            "Mock mode is enabled, so no page was fetched. This placeholder article explains \
             how long-form writing can be condensed into a short, numbered thread that keeps \
             the original argument intact while staying readable on a phone screen."
                .to_string()
        }
        CallPurpose::Thread { count } => {
            let entries: Vec<String> = (1..=count)
                .map(|k| format!("{}/{} Mock entry {} of the generated thread.", k, count, k))
                .collect();
            match request.options.response_format {
                ResponseFormat::Structured => serde_json::to_string(&entries)
                    .map_err(|e| PipelineError::Generation(e.to_string()))?,
                ResponseFormat::Text => entries.join("\n\n"),
            }
        }
        CallPurpose::ImagePrompt => {
            "A clean editorial illustration in muted blues, soft light, no text".to_string()
        }
    };
    Ok(text)
}

#[async_trait]
impl TextModel for MockTextModel {
    async fn generate(&self, request: &TextCallRequest) -> Result<UpstreamTextResult> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::BadRequest("Prompt must not be empty".into()));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        (self.responder)(request).map(UpstreamTextResult::new)
    }
}

pub struct MockImageBackend {
    outcome: Result<Vec<u8>>,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockImageBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self {
            outcome: Ok(decode_image_payload(TINY_PNG_BASE64).unwrap_or_default()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: PipelineError) -> Self {
        Self {
            outcome: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.outcome.clone()
    }
}
