use crate::{
    error::{PipelineError, Result},
    models::{CallPurpose, TextCallRequest, CONTENT_NOT_FOUND},
    pipeline::prompts,
    upstream::TextModel,
};

/// Shortest extraction result accepted as real content.
pub const MIN_CONTENT_CHARS: usize = 100;

pub const NOT_FOUND_MESSAGE: &str =
    "Could not extract content from the URL. Please paste the article text manually.";

/// Retrieves article text for a URL: a literal extraction attempt, then a
/// broad summary attempt only when the first one comes back empty.
pub struct ContentExtractor<'a> {
    text: &'a dyn TextModel,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(text: &'a dyn TextModel) -> Self {
        Self { text }
    }

    pub async fn extract(&self, url: &str) -> Result<String> {
        let specific = TextCallRequest::new(prompts::specific_extraction_prompt(url), CallPurpose::Extraction)
            .with_system_instruction(prompts::extraction_system_instruction())
            .with_search(true);
        let first = self.text.generate(&specific).await?;

        if is_usable(&first.text) {
            log::info!("Specific extraction succeeded ({} chars)", first.trimmed().chars().count());
            return Ok(first.trimmed().to_string());
        }

        log::warn!("Specific extraction came back empty, trying broad summary");
        let broad = TextCallRequest::new(prompts::broad_extraction_prompt(url), CallPurpose::Summary)
            .with_system_instruction(prompts::extraction_system_instruction())
            .with_search(true);
        let second = self.text.generate(&broad).await?;

        if is_usable(&second.text) {
            log::info!("Broad extraction succeeded ({} chars)", second.trimmed().chars().count());
            Ok(second.trimmed().to_string())
        } else {
            Err(PipelineError::ExtractionNotFound(NOT_FOUND_MESSAGE.into()))
        }
    }
}

fn is_usable(text: &str) -> bool {
    !is_sentinel(text) && text.trim().chars().count() >= MIN_CONTENT_CHARS
}

/// Compares against the sentinel ignoring case, inner whitespace and
/// trailing punctuation.
pub fn is_sentinel(text: &str) -> bool {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c == '.' || c == '!')
        .to_lowercase();
    normalized == CONTENT_NOT_FOUND.to_lowercase()
}
