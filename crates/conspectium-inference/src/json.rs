//! Lenient decoding of JSON returned by language models.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use conspectium_core::AiError;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid regex")
});

/// Strip a surrounding Markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Decode model output into `T`.
///
/// Tolerates a surrounding code fence and leading/trailing prose around the
/// outermost JSON object. Undecodable output is a permanent failure: retrying
/// the same prompt is not expected to fix it.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T, AiError> {
    let body = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<T>(body) {
        return Ok(value);
    }

    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(AiError::permanent(
                "model response does not contain a JSON object",
            ))
        }
    };
    serde_json::from_str::<T>(object)
        .map_err(|e| AiError::permanent(format!("failed to decode model JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VariantDraft;

    #[test]
    fn test_plain_json() {
        let draft: VariantDraft = parse_model_json(r#"{"title": "T", "markdown": "M"}"#).unwrap();
        assert_eq!(draft.title, "T");
    }

    #[test]
    fn test_fenced_json() {
        let text = "```json\n{\"title\": \"T\", \"markdown\": \"M\"}\n```";
        let draft: VariantDraft = parse_model_json(text).unwrap();
        assert_eq!(draft.markdown, "M");
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let text = "Вот результат: {\"title\": \"T\"} Надеюсь, помог.";
        let draft: VariantDraft = parse_model_json(text).unwrap();
        assert_eq!(draft.title, "T");
    }

    #[test]
    fn test_garbage_is_permanent() {
        let err = parse_model_json::<VariantDraft>("not json at all").unwrap_err();
        assert!(!err.is_transient());
    }
}
