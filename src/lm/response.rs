//! Pulling a JSON payload out of free-form model replies.
use crate::util::snippet;
use anyhow::{anyhow, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Strip markdown fences or surrounding prose from a model reply.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip language identifier if present
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
    }

    // Prose around a bare object: keep the outermost braces.
    if !text.starts_with('{') {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                return &text[start..=end];
            }
        }
    }

    text
}

/// Deserialize a model reply, reporting where parsing failed.
///
/// Trailing-comma repair only applies when the reply does not parse as is.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json_text = extract_json(text);
    if json_text.is_empty() {
        return Err(anyhow!("model reply was empty"));
    }
    let err = match serde_json::from_str(json_text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    if let Cow::Owned(fixed) = fix_common_typos(json_text) {
        if let Ok(value) = serde_json::from_str(&fixed) {
            return Ok(value);
        }
    }
    Err(anyhow!(
        "invalid JSON at line {} column {}: {err}; reply: {}",
        err.line(),
        err.column(),
        snippet(json_text, 200)
    ))
}

/// Drop trailing commas before a closing brace or bracket.
fn fix_common_typos(json: &str) -> Cow<'_, str> {
    static TRAILING_COMMA: OnceLock<Option<Regex>> = OnceLock::new();
    match TRAILING_COMMA.get_or_init(|| Regex::new(r",(\s*[}\]])").ok()) {
        Some(re) => re.replace_all(json, "$1"),
        None => Cow::Borrowed(json),
    }
}
