//! Locating JSON payloads inside free-form model replies.
use serde::de::DeserializeOwned;

use crate::errors::ReasoningError;

/// Pull the first JSON object out of a reply.
///
/// Accepts a bare object, a fenced code block (with or without a language
/// tag), or an object embedded in prose. Braces inside string literals do
/// not count towards nesting.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Some(object) = balanced_object(trimmed) {
            return Some(object);
        }
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let body = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = body.find(fence) {
            let block = body[..end].trim();
            if let Some(open) = block.find('{') {
                if let Some(object) = balanced_object(&block[open..]) {
                    return Some(object);
                }
            }
        }
    }

    let open = raw.find('{')?;
    balanced_object(&raw[open..])
}

/// Extract and deserialize the first JSON object in `raw`.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, ReasoningError> {
    let object = extract_json_object(raw)
        .ok_or_else(|| ReasoningError::invalid_response("reply contains no JSON object"))?;
    serde_json::from_str(&object)
        .map_err(|err| ReasoningError::invalid_response(format!("reply JSON invalid: {err}")))
}

/// `text` must start with `{`; returns the object up to its matching brace.
fn balanced_object(text: &str) -> Option<String> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[..=idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
