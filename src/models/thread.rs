use serde::Serialize;

pub const MAX_TWEET_CHARS: usize = 280;
pub const MIN_TWEETS: u32 = 3;
pub const MAX_TWEETS: u32 = 15;

/// One numbered post of a thread. `body` starts with the `index/total` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEntry {
    pub index: usize,
    pub total: usize,
    pub body: String,
    pub char_count: usize,
    pub over_limit: bool,
}

impl ThreadEntry {
    /// Builds an entry from upstream text, replacing any advisory marker the
    /// model wrote with the positional one.
    pub fn new(index: usize, total: usize, text: &str) -> Self {
        let body = format!("{}/{} {}", index, total, strip_marker(text));
        let char_count = body.chars().count();
        Self {
            index,
            total,
            body,
            char_count,
            over_limit: char_count > MAX_TWEET_CHARS,
        }
    }
}

/// Removes a leading `k/N` marker (optionally wrapped in parentheses or
/// brackets, or followed by `.`, `:` or `)`) from `text`.
pub fn strip_marker(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed.trim_start_matches(|c| c == '(' || c == '[');

    let digits = |s: &str| s.chars().take_while(|c| c.is_ascii_digit()).count();
    let lead = digits(inner);
    if lead == 0 || !inner[lead..].starts_with('/') {
        return trimmed;
    }
    let after_slash = &inner[lead + 1..];
    let tail = digits(after_slash);
    if tail == 0 {
        return trimmed;
    }
    after_slash[tail..]
        .trim_start_matches(|c| matches!(c, ')' | ']' | '.' | ':'))
        .trim_start()
}

/// Joins entries the way they are copied into a post composer.
pub fn join_entries(entries: &[ThreadEntry]) -> String {
    entries
        .iter()
        .map(|entry| entry.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_rederived() {
        let entry = ThreadEntry::new(2, 5, "4/7 Numbers from upstream are advisory");
        assert_eq!(entry.body, "2/5 Numbers from upstream are advisory");
        assert_eq!((entry.index, entry.total), (2, 5));
    }

    #[test]
    fn test_strip_marker_variants() {
        assert_eq!(strip_marker("1/5 Hook"), "Hook");
        assert_eq!(strip_marker("(3/10) Middle"), "Middle");
        assert_eq!(strip_marker("[2/3]: Point"), "Point");
        assert_eq!(strip_marker("5/5. End"), "End");
        assert_eq!(strip_marker("No marker here"), "No marker here");
        assert_eq!(strip_marker("1/ half marker"), "1/ half marker");
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let text = "é".repeat(276);
        let entry = ThreadEntry::new(1, 3, &text);
        assert_eq!(entry.char_count, 280);
        assert!(!entry.over_limit);

        let entry = ThreadEntry::new(1, 3, &"x".repeat(277));
        assert!(entry.over_limit);
    }
}
