//! Instruction text and schemas sent to the upstream models.
//!
//! Everything here is pure: the same inputs always produce the same strings.

use serde_json::{json, Value};

use crate::models::{ResponseFormat, CONTENT_NOT_FOUND, MAX_TWEET_CHARS};

/// Characters of source text forwarded into image prompts.
const IMAGE_CONTEXT_CHARS: usize = 1500;

pub fn extraction_system_instruction() -> String {
    format!(
        "You are a precise content retrieval assistant. You return article text exactly as \
         published, without commentary. If you cannot access the page or it has no article \
         body, reply with exactly: {}",
        CONTENT_NOT_FOUND
    )
}

/// First attempt: literal extraction of the main body text.
pub fn specific_extraction_prompt(url: &str) -> String {
    format!(
        "Retrieve the article at {url} and return only its main body text.\n\
         - Exclude navigation, menus, headers, footers, ads, cookie notices, comments and \
         related-article links.\n\
         - Keep the paragraphs in their original order, separated by blank lines.\n\
         - Do not summarize, translate or add anything.\n\
         If no article body can be found, reply with exactly: {sentinel}",
        url = url,
        sentinel = CONTENT_NOT_FOUND
    )
}

/// Second attempt: a broad summary when literal extraction came back empty.
pub fn broad_extraction_prompt(url: &str) -> String {
    format!(
        "Find the content published at {url} using search. Write a detailed, factual summary \
         of it in several paragraphs: the main topic, every key point and argument, notable \
         numbers, quotes and conclusions. Write it as plain prose without headings or bullet \
         points. If nothing about this page can be found, reply with exactly: {sentinel}",
        url = url,
        sentinel = CONTENT_NOT_FOUND
    )
}

pub fn thread_system_instruction() -> String {
    format!(
        "You are an expert social media writer who turns long-form articles into engaging \
         threads. Every post you write is at most {} characters including its number.",
        MAX_TWEET_CHARS
    )
}

/// Builds the thread request for `count` posts in the given output contract.
pub fn thread_prompt(content: &str, count: usize, format: ResponseFormat) -> String {
    let output_contract = match format {
        ResponseFormat::Text => format!(
            "Output format: return only the {count} posts, separated by one blank line. \
             No title, no preamble, no closing remarks.",
            count = count
        ),
        ResponseFormat::Structured => format!(
            "Output format: a JSON array of exactly {count} strings, one string per post, \
             in thread order.",
            count = count
        ),
    };

    format!(
        "Convert the following content into a thread of exactly {count} posts.\n\n\
         Rules:\n\
         1. Write exactly {count} posts, no more and no fewer.\n\
         2. Each post must be at most {limit} characters, including its number prefix.\n\
         3. Start every post with its number in the form k/{count} (1/{count}, 2/{count}, \
         ... {count}/{count}) followed by a space.\n\
         4. Post 1/{count} is a hook that makes readers want to continue.\n\
         5. Posts must flow logically, each building on the previous one, and the last post \
         wraps up the thread.\n\
         6. No hashtags unless they appear in the content.\n\n\
         {contract}\n\n\
         Content:\n{content}",
        count = count,
        limit = MAX_TWEET_CHARS,
        contract = output_contract,
        content = content.trim()
    )
}

/// Response schema for structured thread output: an array of `count` strings.
pub fn thread_response_schema(count: usize) -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "STRING",
            "description": format!("One post, at most {} characters, starting with k/{}", MAX_TWEET_CHARS, count)
        },
        "minItems": count,
        "maxItems": count
    })
}

/// Asks the text model for a dedicated image prompt.
pub fn image_prompt_derivation(content: &str) -> String {
    format!(
        "Write a single prompt for an image generation model that illustrates the content \
         below. Describe the subject, composition, art style, color palette, lighting and \
         mood in one paragraph of at most 80 words. The image must contain no text, letters \
         or logos. Reply with the prompt only.\n\nContent:\n{}",
        excerpt(content, IMAGE_CONTEXT_CHARS)
    )
}

/// Image prompt built straight from the content, no intermediate call.
pub fn direct_image_prompt(content: &str) -> String {
    format!(
        "A striking editorial illustration for an article about the following, in a modern \
         flat style with a limited color palette, no text or lettering: {}",
        excerpt(content, IMAGE_CONTEXT_CHARS)
    )
}

fn excerpt(content: &str, max_chars: usize) -> &str {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
