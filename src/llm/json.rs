use serde_json::Value;

/// Find the first JSON object or array embedded in free text
///
/// Models wrap JSON in prose or code fences, so every `{` / `[` is tried as a
/// start; the balanced end is found honoring string literals and escapes,
/// and the first candidate that parses wins.
pub fn extract_json(text: &str) -> Option<Value> {
    scan_candidates(text, b"{[")
}

/// Like [`extract_json`], but only top-level objects are candidates
///
/// Bracketed prose such as `slice [1]` ahead of the payload is skipped.
pub fn extract_json_object(text: &str) -> Option<Value> {
    scan_candidates(text, b"{")
}

fn scan_candidates(text: &str, openers: &[u8]) -> Option<Value> {
    let bytes = text.as_bytes();
    for (start, b) in bytes.iter().enumerate() {
        if !openers.contains(b) {
            continue;
        }
        if let Some(end) = find_balanced_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
    }
    None
}

/// Index of the bracket closing the one at `start`, if any
fn find_balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
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

    #[test]
    fn test_plain_object() {
        let value = extract_json(r#"{"pains": []}"#).unwrap();
        assert!(value["pains"].is_array());
    }

    #[test]
    fn test_code_fence_and_prose() {
        let text = "Here is the extraction you asked for:\n```json\n{\"needs\": [\"offline mode\"]}\n```\nLet me know!";
        let value = extract_json(text).unwrap();
        assert_eq!(value["needs"][0], "offline mode");
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"Result: {"quote": "they said {weird} things \"like }\"", "n": 1} trailing"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["n"], 1);
        assert_eq!(value["quote"], "they said {weird} things \"like }\"");
    }

    #[test]
    fn test_skips_unparseable_candidates() {
        let text = "note {not json} then {\"ok\": true}";
        let value = extract_json(text).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_top_level_array() {
        let value = extract_json("[1, 2, 3]").unwrap();
        assert_eq!(value.as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn test_object_scan_skips_leading_brackets() {
        let text = "Findings for slice [1]:\n{\"pains\": [{\"id\": \"slow-sync\"}]}";

        assert_eq!(extract_json(text).unwrap(), serde_json::json!([1]));
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["pains"][0]["id"], "slow-sync");
    }

    #[test]
    fn test_object_scan_ignores_bare_arrays() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_no_json() {
        assert!(extract_json("I could not find anything.").is_none());
        assert!(extract_json("{\"unterminated\": ").is_none());
    }
}
