use serde::{Deserialize, Serialize};

use super::thread::ThreadEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Content,
    Thread,
    Image,
    /// Any unrecognized task name; rejected by the orchestrator.
    #[serde(other)]
    Unknown,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Content => "content",
            Task::Thread => "thread",
            Task::Image => "image",
            Task::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub task: Task,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tweet_count: Option<u32>,
    #[serde(default)]
    pub image_prompt: Option<String>,
    #[serde(default)]
    pub include_image: bool,
}

impl GenerationRequest {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            url: None,
            content: None,
            tweet_count: None,
            image_prompt: None,
            include_image: false,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tweet_count(mut self, count: u32) -> Self {
        self.tweet_count = Some(count);
        self
    }

    pub fn with_image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.image_prompt = Some(prompt.into());
        self
    }

    pub fn with_image(mut self, include: bool) -> Self {
        self.include_image = include;
        self
    }

    /// User-supplied text, if it has any non-whitespace content.
    pub fn supplied_content(&self) -> Option<&str> {
        non_blank(self.content.as_deref())
    }

    pub fn supplied_url(&self) -> Option<&str> {
        non_blank(self.url.as_deref())
    }

    pub fn supplied_image_prompt(&self) -> Option<&str> {
        non_blank(self.image_prompt.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<ThreadEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Set when the optional image stage failed but the thread succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_error: Option<StageFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub stage: String,
}
