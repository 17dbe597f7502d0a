//! A small best-effort JSON repair pass (spec §4.5/§9 — "LLM JSON
//! fragility": parse strict first, then repair, then fail).
//!
//! This does not attempt to be a general JSON5/JSONC parser — it fixes the
//! two failure modes LLM responses actually exhibit: a trailing comma before
//! a closing brace/bracket, and a response truncated mid-structure (unclosed
//! strings/objects/arrays). Anything else still fails, which is the correct
//! outcome per spec — "never silently substitute defaults".

/// Attempt to repair `raw` into parseable JSON. Always returns a string;
/// callers re-attempt `serde_json::from_str` and treat a second failure as
/// final.
pub fn repair(raw: &str) -> String {
    let without_trailing_commas = strip_trailing_commas(raw);
    close_unterminated(&without_trailing_commas)
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = input.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        if c == ',' {
            // Look ahead past whitespace for a closing brace/bracket.
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }
    out
}

fn close_unterminated(input: &str) -> String {
    let mut out = input.to_string();
    let mut in_string = false;
    let mut escaped = false;
    let mut stack: Vec<char> = Vec::new();

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_comma_before_closing_brace() {
        let repaired = repair(r#"{"a": 1, "b": 2,}"#);
        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn closes_truncated_object_and_string() {
        let repaired = repair(r#"{"outcome": "qualified", "reasoning": "good candidate"#);
        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["outcome"], "qualified");
    }

    #[test]
    fn leaves_already_valid_json_parseable() {
        let repaired = repair(r#"{"a": [1, 2, 3]}"#);
        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["a"][1], 2);
    }
}
