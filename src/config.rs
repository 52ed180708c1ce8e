use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::ResponseFormat;

pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub image_model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub image_model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub image_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageBackendKind {
    Gemini,
    OpenAi,
    Bedrock,
    Mock,
}

impl FromStr for ImageBackendKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ImageBackendKind::Gemini),
            "openai" | "dall-e" | "dalle" => Ok(ImageBackendKind::OpenAi),
            "bedrock" | "titan" => Ok(ImageBackendKind::Bedrock),
            "mock" => Ok(ImageBackendKind::Mock),
            other => Err(PipelineError::Config(format!(
                "Unknown image backend: {}",
                other
            ))),
        }
    }
}

/// How the image stage obtains its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePromptMode {
    /// Feed a prompt built straight from the source content.
    Direct,
    /// Ask the text model for a dedicated image prompt first.
    Derived,
}

impl FromStr for ImagePromptMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ImagePromptMode::Direct),
            "derived" | "derive" => Ok(ImagePromptMode::Derived),
            other => Err(PipelineError::Config(format!(
                "Unknown image prompt mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    /// Serve canned upstream answers instead of calling real services.
    pub mock: bool,
    pub gemini: GeminiConfig,
    pub openai: OpenAiConfig,
    pub bedrock: BedrockConfig,
    pub image_backend: ImageBackendKind,
    pub image_prompt_mode: ImagePromptMode,
    pub thread_format: ResponseFormat,
    pub max_content_words: usize,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            image_model: "gemini-2.0-flash-preview-image-generation".to_string(),
            base_url: DEFAULT_GEMINI_BASE.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        GeminiConfig {
            api_key: non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY")),
            model: non_empty_env("GEMINI_MODEL").unwrap_or(defaults.model),
            image_model: non_empty_env("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            base_url: non_empty_env("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        OpenAiConfig {
            api_key: None,
            image_model: "dall-e-3".to_string(),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
        }
    }
}

impl OpenAiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        OpenAiConfig {
            api_key: non_empty_env("OPENAI_API_KEY"),
            image_model: non_empty_env("OPENAI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            base_url: non_empty_env("OPENAI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        BedrockConfig {
            region: None,
            access_key: None,
            secret_key: None,
            image_model: "amazon.titan-image-generator-v1".to_string(),
        }
    }
}

impl BedrockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        BedrockConfig {
            region: non_empty_env("AWS_REGION").or_else(|| non_empty_env("AWS_DEFAULT_REGION")),
            access_key: non_empty_env("AWS_ACCESS_KEY_ID"),
            secret_key: non_empty_env("AWS_SECRET_ACCESS_KEY"),
            image_model: non_empty_env("BEDROCK_IMAGE_MODEL")
                .unwrap_or_else(|| Self::default().image_model),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: None,
            mock: false,
            gemini: GeminiConfig::default(),
            openai: OpenAiConfig::default(),
            bedrock: BedrockConfig::default(),
            image_backend: ImageBackendKind::Gemini,
            image_prompt_mode: ImagePromptMode::Derived,
            thread_format: ResponseFormat::Structured,
            max_content_words: 5000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the configuration once at startup. Unparseable enum values
    /// are reported as errors rather than silently replaced.
    pub fn from_env() -> Result<Self, PipelineError> {
        let defaults = Self::default();

        let image_backend = match non_empty_env("IMAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.image_backend,
        };
        let image_prompt_mode = match non_empty_env("IMAGE_PROMPT_MODE") {
            Some(value) => value.parse()?,
            None => defaults.image_prompt_mode,
        };
        let thread_format = match non_empty_env("THREAD_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.thread_format,
        };

        Ok(Config {
            host: non_empty_env("HOST").unwrap_or(defaults.host),
            port: env::var("PORT").ok().and_then(|port| port.parse().ok()),
            mock: env::var("THREADSMITH_MOCK").map_or(false, |val| val == "true"),
            gemini: GeminiConfig::from_env(),
            openai: OpenAiConfig::from_env(),
            bedrock: BedrockConfig::from_env(),
            image_backend,
            image_prompt_mode,
            thread_format,
            max_content_words: env::var("MAX_CONTENT_WORDS")
                .ok()
                .and_then(|words| words.parse().ok())
                .filter(|words| *words > 0)
                .unwrap_or(defaults.max_content_words),
            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }

    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_openai(mut self, config: OpenAiConfig) -> Self {
        self.openai = config;
        self
    }

    pub fn with_bedrock(mut self, config: BedrockConfig) -> Self {
        self.bedrock = config;
        self
    }

    pub fn with_image_backend(mut self, backend: ImageBackendKind) -> Self {
        self.image_backend = backend;
        self
    }

    pub fn with_image_prompt_mode(mut self, mode: ImagePromptMode) -> Self {
        self.image_prompt_mode = mode;
        self
    }

    pub fn with_thread_format(mut self, format: ResponseFormat) -> Self {
        self.thread_format = format;
        self
    }

    pub fn with_max_content_words(mut self, words: usize) -> Self {
        self.max_content_words = words;
        self
    }

    pub fn bind_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Name of the missing text-model variable, if any. Never the value.
    pub fn missing_text_credentials(&self) -> Option<&'static str> {
        if self.mock || self.gemini.api_key.is_some() {
            None
        } else {
            Some("GEMINI_API_KEY")
        }
    }

    pub fn missing_image_credentials(&self) -> Option<&'static str> {
        if self.mock {
            return None;
        }
        match self.image_backend {
            ImageBackendKind::Gemini if self.gemini.api_key.is_none() => Some("GEMINI_API_KEY"),
            ImageBackendKind::OpenAi if self.openai.api_key.is_none() => Some("OPENAI_API_KEY"),
            ImageBackendKind::Bedrock if self.bedrock.access_key.is_none() => {
                Some("AWS_ACCESS_KEY_ID")
            }
            ImageBackendKind::Bedrock if self.bedrock.secret_key.is_none() => {
                Some("AWS_SECRET_ACCESS_KEY")
            }
            _ => None,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
