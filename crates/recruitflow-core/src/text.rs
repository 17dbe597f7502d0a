//! Shared text/phone normalization primitives (spec §6, §8 property 6).
//!
//! Used by `recruitflow-candidates` (exact lookup), `recruitflow-matching`
//! (priorities 2–5) and `recruitflow-messaging` (sender resolution).

use regex::Regex;
use std::sync::LazyLock;

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());
static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());
static REFERENCE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:app(?:lication)?[\s#\-]*(?:id)?|ref(?:erence)?|#|id)\s*[:#\-]?\s*(\d+)")
        .unwrap()
});
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*"?([^"<]+?)"?\s*<[^>]+@[^>]+>\s*$"#).unwrap());
static BARE_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^>]+@[^>]+)>").unwrap());

/// Strip all non-digit characters from a phone string.
pub fn digits_only(phone: &str) -> String {
    DIGITS_RE.replace_all(phone, "").to_string()
}

/// Minimum number of significant digits required for a phone match (spec §6).
pub const MIN_SIGNIFICANT_DIGITS: usize = 7;

/// Compare two phone numbers by their digit-only representations.
///
/// Handles country-code prefix differences by checking if either is a
/// suffix of the other, requiring at least [`MIN_SIGNIFICANT_DIGITS`]
/// digits to match. Ported from `original_source/candidates/services.py::_phones_match`.
pub fn phones_match(query_digits: &str, stored_phone: &str) -> bool {
    let stored_digits = digits_only(stored_phone);
    if stored_digits.is_empty() || query_digits.len() < MIN_SIGNIFICANT_DIGITS {
        return false;
    }
    if query_digits == stored_digits {
        return true;
    }
    let (short, long) = if query_digits.len() <= stored_digits.len() {
        (query_digits, stored_digits.as_str())
    } else {
        (stored_digits.as_str(), query_digits)
    };
    long.ends_with(short) && short.len() >= MIN_SIGNIFICANT_DIGITS
}

/// Extract the bare address from an RFC 2822 `"Name" <addr>` string, or
/// return the input unchanged if it is already bare.
pub fn bare_email(raw: &str) -> Option<String> {
    if let Some(caps) = BARE_EMAIL_RE.captures(raw) {
        let addr = caps[1].trim();
        if addr.contains('@') {
            return Some(addr.to_string());
        }
        return None;
    }
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Extract a display name from `"Name" <addr>`. Returns `None` when there is
/// no quoted/bare name portion (e.g. the sender is a bare address).
pub fn display_name(raw: &str) -> Option<String> {
    DISPLAY_NAME_RE
        .captures(raw)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Strip optional Markdown code fences from an LLM response, returning the
/// inner text when present, or the trimmed original otherwise.
pub fn strip_json_fence(raw: &str) -> String {
    if let Some(caps) = JSON_FENCE_RE.captures(raw) {
        return caps[1].trim().to_string();
    }
    raw.trim().to_string()
}

/// Extract the first `(?:application|ref|id|#) [:#-]? <digits>` reference id
/// from free text (spec §4.4 priority 3).
pub fn extract_reference_id(text: &str) -> Option<i64> {
    REFERENCE_ID_RE
        .captures(text)
        .and_then(|c| c[1].parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_suffix_match_handles_country_code() {
        let query = digits_only("+44 7700 900123");
        assert!(phones_match(&query, "07700900123"));
    }

    #[test]
    fn phone_match_requires_minimum_digits() {
        assert!(!phones_match("12345", "012345"));
    }

    #[test]
    fn phone_match_rejects_unrelated_numbers() {
        let query = digits_only("+1 415 555 0100");
        assert!(!phones_match(&query, "+44 7700 900123"));
    }

    #[test]
    fn reference_id_matches_common_forms() {
        assert_eq!(extract_reference_id("Re: Application #1234"), Some(1234));
        assert_eq!(extract_reference_id("ref: 42"), Some(42));
        assert_eq!(extract_reference_id("no digits here"), None);
    }

    #[test]
    fn fence_strip_handles_fenced_and_bare_json() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn display_name_parses_rfc2822_form() {
        assert_eq!(
            display_name("\"Ana Popescu\" <ana@example.com>"),
            Some("Ana Popescu".to_string())
        );
        assert_eq!(display_name("ana@example.com"), None);
    }

    #[test]
    fn bare_email_extracts_from_display_form() {
        assert_eq!(
            bare_email("\"Ana\" <ana@example.com>"),
            Some("ana@example.com".to_string())
        );
        assert_eq!(bare_email("ana@example.com"), Some("ana@example.com".to_string()));
    }
}
