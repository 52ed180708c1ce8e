use crate::{
    config::ImagePromptMode,
    error::{PipelineError, Result, Stage},
    models::{CallPurpose, ImageResult, TextCallRequest},
    pipeline::prompts,
    upstream::{ImageBackend, TextModel},
};

/// Where the image prompt comes from for one run.
pub enum PromptSource<'a> {
    /// Caller supplied the prompt verbatim.
    Explicit(&'a str),
    /// Build it from source content according to the configured mode.
    Content(&'a str),
}

pub struct ImagePipeline<'a> {
    text: Option<&'a dyn TextModel>,
    backend: &'a dyn ImageBackend,
    mode: ImagePromptMode,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(
        text: Option<&'a dyn TextModel>,
        backend: &'a dyn ImageBackend,
        mode: ImagePromptMode,
    ) -> Self {
        Self {
            text,
            backend,
            mode,
        }
    }

    /// Resolves the prompt then synthesizes the image. Prompt derivation
    /// failures are tagged `generation`, synthesis failures `image`.
    pub async fn generate(&self, source: PromptSource<'_>) -> Result<ImageResult> {
        let prompt = self.resolve_prompt(source).await?;

        log::info!("Requesting image from {} backend", self.backend.name());
        let bytes = self
            .backend
            .generate_image(&prompt)
            .await
            .map_err(|e| e.into_stage(Stage::Image))?;

        ImageResult::from_bytes(&bytes)
    }

    async fn resolve_prompt(&self, source: PromptSource<'_>) -> Result<String> {
        let content = match source {
            PromptSource::Explicit(prompt) => return Ok(prompt.trim().to_string()),
            PromptSource::Content(content) => content,
        };

        match self.mode {
            ImagePromptMode::Direct => Ok(prompts::direct_image_prompt(content)),
            ImagePromptMode::Derived => {
                let text = self.text.ok_or_else(|| {
                    PipelineError::Config("GEMINI_API_KEY is not set".into())
                })?;
                let request = TextCallRequest::new(
                    prompts::image_prompt_derivation(content),
                    CallPurpose::ImagePrompt,
                );
                let derived = text
                    .generate(&request)
                    .await
                    .map_err(|e| e.into_stage(Stage::Generation))?;
                if derived.is_blank() {
                    return Err(PipelineError::Generation("no image prompt returned".into()));
                }
                log::debug!("Derived image prompt: {}", derived.trimmed());
                Ok(derived.trimmed().to_string())
            }
        }
    }
}
