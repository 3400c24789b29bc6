//! JSON extraction from model responses
//!
//! Models wrap JSON in code fences, prepend chatter, or leave trailing
//! commas. These are cleaned up before parsing; anything still unparsable is
//! an incomplete response, which callers may retry.

use serde_json::Value;
use tracing::debug;

use crate::types::OracleError;

/// Parse the JSON object contained in a model response
pub fn extract_json(content: &str, provider: &str) -> Result<Value, OracleError> {
    let cleaned = preprocess(content);

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    debug!("Initial JSON parse failed, attempting repair");
    let repaired = fix_trailing_commas(&cleaned);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        return Ok(value);
    }

    if let Some(extracted) = extract_object(&repaired)
        && let Ok(value) = serde_json::from_str::<Value>(extracted)
    {
        debug!("JSON extracted from mixed content");
        return Ok(value);
    }

    let mut err = OracleError::incomplete(format!(
        "Response is not valid JSON. Content preview: {}...",
        cleaned.chars().take(200).collect::<String>()
    ));
    err.provider = Some(provider.to_string());
    Err(err)
}

fn preprocess(raw: &str) -> String {
    let mut s = raw.trim().trim_start_matches('\u{feff}');

    // ```json ... ``` or ``` ... ```
    if s.starts_with("```")
        && let Some(first_newline) = s.find('\n')
    {
        s = &s[first_newline + 1..];
    }
    if let Some(stripped) = s.trim_end().strip_suffix("```") {
        s = stripped;
    }

    s.trim().to_string()
}

/// Drop commas directly followed by `]` or `}` outside strings
fn fix_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            result.push(ch);
            match ch {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        result.push(ch);
    }

    result
}

/// First balanced `{ ... }` span
fn extract_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in s[start..].char_indices() {
        if in_string {
            match ch {
                _ if escape => escape = false,
                '\\' => escape = true,
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
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"summary": "ok"}"#, "test").unwrap();
        assert_eq!(value, json!({"summary": "ok"}));
    }

    #[test]
    fn test_code_fence_and_trailing_comma() {
        let raw = "```json\n{\"files\": [\"a\", \"b\",],}\n```";
        let value = extract_json(raw, "test").unwrap();
        assert_eq!(value, json!({"files": ["a", "b"]}));
    }

    #[test]
    fn test_mixed_content() {
        let raw = "Here you go: {\"summary\": \"a {nested} brace\"} hope that helps";
        let value = extract_json(raw, "test").unwrap();
        assert_eq!(value["summary"], "a {nested} brace");
    }

    #[test]
    fn test_commas_inside_strings_survive() {
        let raw = r#"{"summary": "a, }", "x": 1,}"#;
        let value = extract_json(raw, "test").unwrap();
        assert_eq!(value["summary"], "a, }");
    }

    #[test]
    fn test_garbage_is_retryable() {
        let err = extract_json("not json at all", "openai").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.provider.as_deref(), Some("openai"));
    }
}
