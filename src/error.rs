use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Config,
    Extraction,
    Generation,
    Image,
    Transport,
    BadRequest,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Extraction => "extraction",
            Stage::Generation => "generation",
            Stage::Image => "image",
            Stage::Transport => "transport",
            Stage::BadRequest => "bad-request",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Missing credentials or invalid operator configuration.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Network failure or an unparseable upstream response. Safe to retry.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The URL yielded no usable content.
    #[error("{0}")]
    ExtractionNotFound(String),
    /// Upstream answered but the content failed validation.
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Config,
            PipelineError::Transport(_) => Stage::Transport,
            PipelineError::ExtractionNotFound(_) => Stage::Extraction,
            PipelineError::Generation(_) => Stage::Generation,
            PipelineError::Image(_) => Stage::Image,
            PipelineError::BadRequest(_) => Stage::BadRequest,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::BadRequest(_) => 400,
            PipelineError::ExtractionNotFound(_) => 404,
            PipelineError::Config(_)
            | PipelineError::Transport(_)
            | PipelineError::Generation(_)
            | PipelineError::Image(_) => 500,
        }
    }

    /// The bare message without the stage prefix.
    pub fn message(&self) -> &str {
        match self {
            PipelineError::Config(msg)
            | PipelineError::Transport(msg)
            | PipelineError::ExtractionNotFound(msg)
            | PipelineError::Generation(msg)
            | PipelineError::Image(msg)
            | PipelineError::BadRequest(msg) => msg,
        }
    }

    /// Re-tags a failure as belonging to `stage`. Configuration errors keep
    /// their tag so operators still see what is missing.
    pub fn into_stage(self, stage: Stage) -> Self {
        if matches!(self, PipelineError::Config(_)) || self.stage() == stage {
            return self;
        }
        let msg = self.message().to_string();
        match stage {
            Stage::Config => PipelineError::Config(msg),
            Stage::Extraction => PipelineError::ExtractionNotFound(msg),
            Stage::Generation => PipelineError::Generation(msg),
            Stage::Image => PipelineError::Image(msg),
            Stage::Transport => PipelineError::Transport(msg),
            Stage::BadRequest => PipelineError::BadRequest(msg),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest messages include the URL but never headers, so keys stay out.
        PipelineError::Transport(e.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
