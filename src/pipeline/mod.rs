pub mod extractor;
pub mod image;
pub mod prompts;
pub mod thread;

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    config::{Config, ImagePromptMode},
    error::{PipelineError, Result},
    logger,
    models::{
        join_entries, GenerationRequest, GenerationResponse, StageFailure, Task, MAX_TWEETS,
        MIN_TWEETS,
    },
    upstream::{self, ImageBackend, TextModel},
};

pub use extractor::ContentExtractor;
pub use image::{ImagePipeline, PromptSource};
pub use thread::ThreadGenerator;

/// Where a request's source text comes from.
enum Source<'r> {
    Text(&'r str),
    Url(&'r str),
}

/// Dispatches one request through extraction, thread generation and the
/// optional image stage. Holds only immutable configuration and clients.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    text: Option<Arc<dyn TextModel>>,
    image: Option<Arc<dyn ImageBackend>>,
}

impl Pipeline {
    /// Builds the clients the configuration has credentials for. Missing
    /// credentials are reported per request, not here; an invalid backend
    /// setting fails startup.
    pub async fn from_config(config: Config) -> Result<Self> {
        let http = upstream::http_client(&config)?;
        let text = upstream::text_model_from_config(&config, &http);
        let image = upstream::image_backend_from_config(&config, &http).await?;
        Ok(Self::with_backends(config, text, image))
    }

    pub fn with_backends(
        config: Config,
        text: Option<Arc<dyn TextModel>>,
        image: Option<Arc<dyn ImageBackend>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            text,
            image,
        }
    }

    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let request_id = Uuid::new_v4();
        log::info!("[{}] Running {} task", request_id, request.task.as_str());
        let _timer = logger::timer(&format!("{} task {}", request.task.as_str(), request_id));

        let result = match request.task {
            Task::Content => self.run_content(&request).await,
            Task::Thread => self.run_thread(&request).await,
            Task::Image => self.run_image(&request).await,
            Task::Unknown => Err(PipelineError::BadRequest(
                "Invalid task, expected one of: content, thread, image".into(),
            )),
        };

        if let Err(e) = &result {
            log::error!(
                "[{}] {} task failed at {} stage: {}",
                request_id,
                request.task.as_str(),
                e.stage(),
                e.message()
            );
        }
        result
    }

    async fn run_content(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let url = request
            .supplied_url()
            .ok_or_else(|| PipelineError::BadRequest("A url is required for the content task".into()))
            .and_then(validate_url)?;
        let text = self.require_text()?;

        let content = ContentExtractor::new(text).extract(url).await?;
        Ok(GenerationResponse {
            text: Some(content),
            ..Default::default()
        })
    }

    async fn run_thread(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let count = validate_tweet_count(request.tweet_count)?;
        let source = content_source(request)?;
        let text = self.require_text()?;
        let backend = if request.include_image {
            Some(self.require_image()?)
        } else {
            None
        };

        let content = self.resolve_content(text, source).await?;
        let content = limit_words(&content, self.config.max_content_words);
        let generator = ThreadGenerator::new(text, self.config.thread_format);

        let (entries, image) = match backend {
            Some(backend) => {
                let images = ImagePipeline::new(Some(text), backend, self.config.image_prompt_mode);
                let prompt_source = match request.supplied_image_prompt() {
                    Some(prompt) => PromptSource::Explicit(prompt),
                    None => PromptSource::Content(content),
                };
                // Independent stages: the image never depends on the thread.
                let (entries, image) = futures::join!(
                    generator.generate(content, count),
                    images.generate(prompt_source)
                );
                (entries?, Some(image))
            }
            None => (generator.generate(content, count).await?, None),
        };

        let mut response = GenerationResponse {
            text: Some(join_entries(&entries)),
            entries: Some(entries),
            ..Default::default()
        };
        match image {
            Some(Ok(image)) => response.image_url = Some(image.to_data_uri()),
            Some(Err(e)) => {
                log::warn!("Image stage failed, returning thread without image: {}", e);
                response.image_error = Some(StageFailure {
                    stage: e.stage().to_string(),
                    message: e.message().to_string(),
                });
            }
            None => {}
        }
        Ok(response)
    }

    async fn run_image(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let explicit = request.supplied_image_prompt();
        let source = match explicit {
            Some(_) => None,
            None => Some(content_source(request)?),
        };
        let backend = self.require_image()?;

        let needs_text = match source {
            None => false,
            Some(Source::Url(_)) => true,
            Some(Source::Text(_)) => self.config.image_prompt_mode == ImagePromptMode::Derived,
        };
        let text = if needs_text {
            Some(self.require_text()?)
        } else {
            self.text.as_deref()
        };

        let images = ImagePipeline::new(text, backend, self.config.image_prompt_mode);
        let image = match (explicit, source) {
            (Some(prompt), _) => images.generate(PromptSource::Explicit(prompt)).await?,
            (None, Some(source)) => {
                let content = match (source, text) {
                    (Source::Url(url), Some(text)) => {
                        ContentExtractor::new(text).extract(url).await?
                    }
                    (Source::Url(_), None) => return Err(self.missing_text()),
                    (Source::Text(content), _) => content.to_string(),
                };
                let content = limit_words(&content, self.config.max_content_words);
                images.generate(PromptSource::Content(content)).await?
            }
            (None, None) => {
                return Err(PipelineError::BadRequest(
                    "An imagePrompt, content or url is required for the image task".into(),
                ))
            }
        };

        Ok(GenerationResponse {
            image_url: Some(image.to_data_uri()),
            ..Default::default()
        })
    }

    async fn resolve_content(&self, text: &dyn TextModel, source: Source<'_>) -> Result<String> {
        match source {
            Source::Text(content) => Ok(content.to_string()),
            Source::Url(url) => ContentExtractor::new(text).extract(url).await,
        }
    }

    fn require_text(&self) -> Result<&dyn TextModel> {
        self.text.as_deref().ok_or_else(|| self.missing_text())
    }

    fn require_image(&self) -> Result<&dyn ImageBackend> {
        self.image.as_deref().ok_or_else(|| {
            PipelineError::Config(format!(
                "Image generation is not configured: {} is not set",
                self.config
                    .missing_image_credentials()
                    .unwrap_or("image backend credentials")
            ))
        })
    }

    fn missing_text(&self) -> PipelineError {
        PipelineError::Config(format!(
            "Text generation is not configured: {} is not set",
            self.config
                .missing_text_credentials()
                .unwrap_or("text model credentials")
        ))
    }
}

/// Pasted text wins over a URL when both are present.
fn content_source(request: &GenerationRequest) -> Result<Source<'_>> {
    if let Some(content) = request.supplied_content() {
        return Ok(Source::Text(content));
    }
    match request.supplied_url() {
        Some(url) => validate_url(url).map(Source::Url),
        None => Err(PipelineError::BadRequest(
            "Either content or a url is required".into(),
        )),
    }
}

fn validate_tweet_count(count: Option<u32>) -> Result<usize> {
    match count {
        Some(count) if (MIN_TWEETS..=MAX_TWEETS).contains(&count) => Ok(count as usize),
        Some(count) => Err(PipelineError::BadRequest(format!(
            "tweetCount must be between {} and {}, got {}",
            MIN_TWEETS, MAX_TWEETS, count
        ))),
        None => Err(PipelineError::BadRequest(
            "tweetCount is required for the thread task".into(),
        )),
    }
}

fn validate_url(url: &str) -> Result<&str> {
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .map(|rest| rest.split(|c| c == '/' || c == '?' || c == '#').next().unwrap_or(""));
    match host {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => Ok(url),
        _ => Err(PipelineError::BadRequest(format!(
            "Invalid url, expected an http(s) address: {}",
            url
        ))),
    }
}

/// Keeps at most `max_words` words, preserving the original spacing of the
/// kept prefix.
pub fn limit_words(text: &str, max_words: usize) -> &str {
    let mut words = 0;
    let mut in_word = false;
    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            if words == max_words {
                log::info!("Content truncated to {} words", max_words);
                return text[..idx].trim_end();
            }
            words += 1;
            in_word = true;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeminiConfig, ImageBackendKind};
    use crate::models::{CallPurpose, ResponseFormat};
    use crate::upstream::{MockImageBackend, MockTextModel};

    fn article(words: usize) -> String {
        (0..words)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn pipeline(
        text: Option<Arc<MockTextModel>>,
        image: Option<Arc<MockImageBackend>>,
    ) -> Pipeline {
        Pipeline::with_backends(
            Config::new().with_image_prompt_mode(ImagePromptMode::Direct),
            text.map(|t| t as Arc<dyn TextModel>),
            image.map(|i| i as Arc<dyn ImageBackend>),
        )
    }

    #[tokio::test]
    async fn test_unknown_task_is_bad_request_without_calls() {
        let text = Arc::new(MockTextModel::offline());
        let image = Arc::new(MockImageBackend::new());
        let err = pipeline(Some(text.clone()), Some(image.clone()))
            .run(GenerationRequest::new(Task::Unknown).with_content("x"))
            .await
            .unwrap_err();

        assert_eq!(err.http_status(), 400);
        assert_eq!(text.call_count(), 0);
        assert!(image.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_thread_from_content() {
        let text = Arc::new(MockTextModel::offline());
        let response = pipeline(Some(text.clone()), None)
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_content(article(500))
                    .with_tweet_count(5),
            )
            .await
            .unwrap();

        let entries = response.entries.unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries[0].body.starts_with("1/5"));
        assert!(entries[4].body.starts_with("5/5"));
        assert!(entries.iter().all(|e| e.char_count <= 280));
        assert!(response.text.unwrap().contains("\n\n3/5 "));
        assert!(response.image_url.is_none());
        assert_eq!(text.call_count(), 1);
    }

    #[tokio::test]
    async fn test_thread_count_out_of_range() {
        let text = Arc::new(MockTextModel::offline());
        let p = pipeline(Some(text.clone()), None);
        for count in [None, Some(2), Some(16)] {
            let mut request = GenerationRequest::new(Task::Thread).with_content("text");
            request.tweet_count = count;
            assert_eq!(p.run(request).await.unwrap_err().http_status(), 400);
        }
        assert_eq!(text.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_text_credentials_is_config_error() {
        let err = pipeline(None, None)
            .run(GenerationRequest::new(Task::Content).with_url("https://example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.message().contains("GEMINI_API_KEY"));
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn test_missing_image_credentials_checked_before_any_call() {
        let text = Arc::new(MockTextModel::offline());
        let err = pipeline(Some(text.clone()), None)
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_url("https://example.com/post")
                    .with_tweet_count(4)
                    .with_image(true),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(text.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_failure_keeps_thread() {
        let text = Arc::new(MockTextModel::offline());
        let image = Arc::new(MockImageBackend::failing(PipelineError::Transport(
            "backend down".into(),
        )));
        let response = pipeline(Some(text), Some(image))
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_content(article(300))
                    .with_tweet_count(5)
                    .with_image(true),
            )
            .await
            .unwrap();

        assert_eq!(response.entries.unwrap().len(), 5);
        assert!(response.image_url.is_none());
        assert_eq!(
            response.image_error,
            Some(StageFailure {
                stage: "image".into(),
                message: "backend down".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_thread_with_image() {
        let text = Arc::new(MockTextModel::offline());
        let image = Arc::new(MockImageBackend::new());
        let response = pipeline(Some(text), Some(image.clone()))
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_content("Tides and the moon")
                    .with_tweet_count(3)
                    .with_image(true),
            )
            .await
            .unwrap();

        assert_eq!(response.entries.unwrap().len(), 3);
        assert!(response.image_url.unwrap().starts_with("data:image/png;base64,"));
        assert!(image.prompts()[0].contains("Tides and the moon"));
    }

    #[tokio::test]
    async fn test_content_not_found_is_404_and_stops() {
        let text = Arc::new(MockTextModel::scripted(vec![
            Ok("Content not found".into()),
            Ok("Too short".into()),
        ]));
        let p = pipeline(Some(text.clone()), None);

        let err = p
            .run(GenerationRequest::new(Task::Content).with_url("https://example.com/missing"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
        assert_eq!(text.call_count(), 2);
    }

    #[tokio::test]
    async fn test_thread_from_url_stops_when_not_found() {
        let text = Arc::new(MockTextModel::scripted(vec![Ok("".into()), Ok("".into())]));
        let err = pipeline(Some(text.clone()), None)
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_url("https://example.com/missing")
                    .with_tweet_count(5),
            )
            .await
            .unwrap_err();

        assert_eq!(err.http_status(), 404);
        let calls = text.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.purpose.is_extraction()));
    }

    #[tokio::test]
    async fn test_thread_from_url_extracts_first() {
        let text = Arc::new(MockTextModel::offline());
        pipeline(Some(text.clone()), None)
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_url("https://example.com/post")
                    .with_tweet_count(6),
            )
            .await
            .unwrap();

        let purposes: Vec<_> = text.calls().iter().map(|c| c.purpose).collect();
        assert_eq!(purposes, vec![CallPurpose::Extraction, CallPurpose::Thread { count: 6 }]);
    }

    #[tokio::test]
    async fn test_content_task_rejects_bad_urls() {
        let text = Arc::new(MockTextModel::offline());
        let p = pipeline(Some(text.clone()), None);
        for url in ["ftp://example.com", "example.com", "https://", "https:// spaced"] {
            let err = p
                .run(GenerationRequest::new(Task::Content).with_url(url))
                .await
                .unwrap_err();
            assert_eq!(err.http_status(), 400, "url {}", url);
        }
        assert_eq!(text.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_task_with_explicit_prompt_needs_no_text_model() {
        let image = Arc::new(MockImageBackend::new());
        let response = pipeline(None, Some(image.clone()))
            .run(GenerationRequest::new(Task::Image).with_image_prompt("a lighthouse at night"))
            .await
            .unwrap();

        assert!(response.image_url.is_some());
        assert_eq!(image.prompts(), vec!["a lighthouse at night".to_string()]);
    }

    #[tokio::test]
    async fn test_image_task_derivation_failure_is_generation() {
        let text = Arc::new(MockTextModel::scripted(vec![Err(PipelineError::Generation(
            "no content returned".into(),
        ))]));
        let image = Arc::new(MockImageBackend::new());
        let p = Pipeline::with_backends(
            Config::new().with_image_prompt_mode(ImagePromptMode::Derived),
            Some(text as Arc<dyn TextModel>),
            Some(image.clone() as Arc<dyn ImageBackend>),
        );

        let err = p
            .run(GenerationRequest::new(Task::Image).with_content("Rivers"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
        assert!(image.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_content_is_limited_before_generation() {
        let text = Arc::new(MockTextModel::offline());
        let p = Pipeline::with_backends(
            Config::new()
                .with_max_content_words(10)
                .with_thread_format(ResponseFormat::Text),
            Some(text.clone() as Arc<dyn TextModel>),
            None,
        );
        p.run(
            GenerationRequest::new(Task::Thread)
                .with_content(article(50))
                .with_tweet_count(3),
        )
        .await
        .unwrap();

        let prompt = &text.calls()[0].prompt;
        assert!(prompt.contains("word9"));
        assert!(!prompt.contains("word10"));
    }

    #[tokio::test]
    async fn test_from_config_mock_mode() {
        let config = Config::new()
            .with_mock(true)
            .with_gemini(GeminiConfig::new())
            .with_image_backend(ImageBackendKind::OpenAi);
        let p = Pipeline::from_config(config).await.unwrap();
        let response = p
            .run(
                GenerationRequest::new(Task::Thread)
                    .with_content("Mock article")
                    .with_tweet_count(3)
                    .with_image(true),
            )
            .await
            .unwrap();

        assert_eq!(response.entries.unwrap().len(), 3);
        assert!(response.image_url.is_some());
    }

    #[test]
    fn test_limit_words() {
        assert_eq!(limit_words("one  two\nthree four", 3), "one  two\nthree");
        assert_eq!(limit_words("  one two ", 5), "  one two ");
        assert_eq!(limit_words("one two", 0), "");
    }
}
