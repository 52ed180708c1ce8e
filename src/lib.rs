//! Threadsmith turns long-form articles into numbered social-media threads,
//! optionally illustrated, by orchestrating generative text and image
//! services.

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod upstream;

#[cfg(feature = "server")]
pub mod server;

pub use config::{BedrockConfig, Config, GeminiConfig, ImageBackendKind, ImagePromptMode, OpenAiConfig};
pub use error::{PipelineError, Result, Stage};
pub use models::*;
pub use pipeline::Pipeline;
pub use upstream::{ImageBackend, TextModel};
