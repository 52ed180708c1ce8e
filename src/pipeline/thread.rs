use serde_json::Value;

use crate::{
    error::{PipelineError, Result},
    models::{CallPurpose, ResponseFormat, TextCallRequest, ThreadEntry},
    pipeline::prompts,
    upstream::TextModel,
};

const GENERATION_FAILED: &str = "could not generate tweets";

/// Keys under which models tend to nest the post list or a post's text.
const LIST_KEYS: [&str; 4] = ["tweets", "entries", "thread", "posts"];
const TEXT_KEYS: [&str; 5] = ["text", "body", "content", "tweet", "post"];

/// Turns source text into exactly `count` numbered thread entries.
pub struct ThreadGenerator<'a> {
    text: &'a dyn TextModel,
    format: ResponseFormat,
}

impl<'a> ThreadGenerator<'a> {
    pub fn new(text: &'a dyn TextModel, format: ResponseFormat) -> Self {
        Self { text, format }
    }

    pub async fn generate(&self, content: &str, count: usize) -> Result<Vec<ThreadEntry>> {
        let mut request = TextCallRequest::new(
            prompts::thread_prompt(content, count, self.format),
            CallPurpose::Thread { count },
        )
        .with_system_instruction(prompts::thread_system_instruction());
        if self.format == ResponseFormat::Structured {
            request = request.with_structured_output(prompts::thread_response_schema(count));
        }

        let raw = self.text.generate(&request).await?;
        let entries = parse_entries(&raw.text, count)?;

        let over_limit = entries.iter().filter(|e| e.over_limit).count();
        if over_limit > 0 {
            log::warn!("{} of {} entries exceed the length limit", over_limit, count);
        }
        Ok(entries)
    }
}

/// Accepts either output contract: a JSON answer is parsed as structured,
/// anything else is split on blank lines.
pub fn parse_entries(raw: &str, count: usize) -> Result<Vec<ThreadEntry>> {
    let unfenced = strip_code_fence(raw);
    let segments = match serde_json::from_str::<Value>(unfenced) {
        Ok(value) => structured_segments(&value)?,
        Err(_) => free_text_segments(unfenced),
    };

    if segments.len() != count {
        log::warn!("Expected {} thread entries, upstream returned {}", count, segments.len());
        return Err(PipelineError::Generation(GENERATION_FAILED.into()));
    }

    Ok(segments
        .iter()
        .enumerate()
        .map(|(i, segment)| ThreadEntry::new(i + 1, count, segment))
        .collect())
}

fn structured_segments(value: &Value) -> Result<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| PipelineError::Generation(GENERATION_FAILED.into()))?,
        _ => return Err(PipelineError::Generation(GENERATION_FAILED.into())),
    };

    items
        .iter()
        .map(|item| {
            let text = match item {
                Value::String(text) => Some(text.as_str()),
                Value::Object(map) => TEXT_KEYS
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str)),
                _ => None,
            };
            text.map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PipelineError::Generation(GENERATION_FAILED.into()))
        })
        .collect()
}

fn free_text_segments(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                segments.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        segments.push(current.join("\n"));
    }

    segments
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, e.g. ```json
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockTextModel;

    #[test]
    fn test_free_text_split_on_blank_lines() {
        let raw = "1/3 Hook line\n\n2/3 Middle part\nwith a second line\n\n\n3/3 The end\n";
        let entries = parse_entries(raw, 3).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].body, "1/3 Hook line");
        assert_eq!(entries[1].body, "2/3 Middle part\nwith a second line");
        assert_eq!(entries[2].body, "3/3 The end");
    }

    #[test]
    fn test_count_mismatch_is_not_truncated() {
        let raw = "1/4 a\n\n2/4 b\n\n3/4 c\n\n4/4 d";
        assert_eq!(
            parse_entries(raw, 3),
            Err(PipelineError::Generation("could not generate tweets".into()))
        );
        assert!(parse_entries(raw, 5).is_err());
    }

    #[test]
    fn test_structured_strings_are_renumbered() {
        let raw = r#"["1/3 First", "2/3 Second", "Third without marker"]"#;
        let entries = parse_entries(raw, 3).unwrap();
        let bodies: Vec<_> = entries.iter().map(|e| e.body.as_str()).collect();
        assert_eq!(bodies, vec!["1/3 First", "2/3 Second", "3/3 Third without marker"]);
        assert!(entries.iter().all(|e| e.total == 3));
    }

    #[test]
    fn test_structured_objects_and_wrappers() {
        let raw = r#"{"tweets": [{"text": "9/9 Hook"}, {"body": "Point"}, {"tweet": "Close"}]}"#;
        let entries = parse_entries(raw, 3).unwrap();
        assert_eq!(entries[0].body, "1/3 Hook");
        assert_eq!(entries[2].index, 3);

        let raw = "```json\n[\"a\", \"b\", \"c\"]\n```";
        assert_eq!(parse_entries(raw, 3).unwrap()[1].body, "2/3 b");
    }

    #[test]
    fn test_fenced_free_text() {
        let raw = "```\n1/3 a\n\n2/3 b\n\n3/3 c\n```";
        let bodies: Vec<_> = parse_entries(raw, 3)
            .unwrap()
            .into_iter()
            .map(|e| e.body)
            .collect();
        assert_eq!(bodies, vec!["1/3 a", "2/3 b", "3/3 c"]);
    }

    #[test]
    fn test_structured_garbage_is_rejected() {
        assert!(parse_entries(r#"{"summary": "nope"}"#, 3).is_err());
        assert!(parse_entries(r#"["a", 2, "c"]"#, 3).is_err());
        assert!(parse_entries("42", 3).is_err());
    }

    #[tokio::test]
    async fn test_generate_requests_structured_output() {
        let model = MockTextModel::offline();
        let entries = ThreadGenerator::new(&model, ResponseFormat::Structured)
            .generate("An article about rivers.", 5)
            .await
            .unwrap();

        assert_eq!(entries.len(), 5);
        assert!(entries[0].body.starts_with("1/5"));
        assert!(entries[4].body.starts_with("5/5"));
        assert!(entries.iter().all(|e| e.char_count <= 280));

        let call = &model.calls()[0];
        assert_eq!(call.options.response_format, ResponseFormat::Structured);
        assert_eq!(call.options.response_schema.as_ref().unwrap()["maxItems"], 5);
        assert!(call.prompt.contains("An article about rivers."));
    }

    #[tokio::test]
    async fn test_every_count_in_range() {
        for count in 3..=15 {
            for format in [ResponseFormat::Text, ResponseFormat::Structured] {
                let model = MockTextModel::offline();
                let entries = ThreadGenerator::new(&model, format)
                    .generate("Body", count)
                    .await
                    .unwrap();
                assert_eq!(entries.len(), count);
                for (i, entry) in entries.iter().enumerate() {
                    assert!(entry.body.starts_with(&format!("{}/{} ", i + 1, count)));
                    assert!(!entry.over_limit);
                }
            }
        }
    }
}
