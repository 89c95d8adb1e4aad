//! Pulling a JSON object out of model output.
//!
//! Models asked for "JSON only" still wrap it in markdown fences or add a
//! sentence before it. [`extract_json_object`] strips fences, then falls back
//! to the outermost `{ ... }` span. Anything that is not an object is
//! [`ProviderError::Malformed`].

use serde_json::{Map, Value};

use crate::provider::{ProviderError, ProviderResult};

/// Strip a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse model output as a JSON object.
pub fn extract_json_object(raw: &str) -> ProviderResult<Map<String, Value>> {
    let body = strip_code_fences(raw);

    let parsed = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(first_err) => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end])
                .map_err(|e| ProviderError::Malformed {
                    reason: format!("invalid JSON: {e}"),
                })?,
            _ => {
                return Err(ProviderError::Malformed {
                    reason: format!("invalid JSON: {first_err}"),
                });
            }
        },
    };

    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(ProviderError::Malformed {
            reason: format!("expected a JSON object, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn plain_object() {
        let map = extract_json_object(r#"{"title": "Cells"}"#).unwrap();
        assert_eq!(map["title"], "Cells");
    }

    #[test]
    fn json_fence_stripped() {
        let map = extract_json_object("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn bare_fence_stripped() {
        let map = extract_json_object("```\n{\"a\": 2}\n```").unwrap();
        assert_eq!(map["a"], 2);
    }

    #[test]
    fn prose_around_object() {
        let map = extract_json_object("Sure! Here it is: {\"a\": 3} Hope that helps.").unwrap();
        assert_eq!(map["a"], 3);
    }

    #[test]
    fn array_is_malformed() {
        assert_matches!(
            extract_json_object("[1, 2, 3]"),
            Err(ProviderError::Malformed { reason }) if reason.contains("array")
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_matches!(
            extract_json_object("no json here"),
            Err(ProviderError::Malformed { .. })
        );
    }
}
