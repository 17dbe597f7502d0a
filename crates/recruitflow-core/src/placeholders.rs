//! Placeholder substitution for prompts and message templates (spec §6, §9).
//!
//! Substitution is literal string replacement; unknown tokens are left
//! intact rather than erroring.

use std::collections::HashMap;

/// A small value type carrying the documented placeholder slots.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderMap {
    slots: HashMap<&'static str, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.slots.insert(key, value.into());
        self
    }

    /// Replace every `{token}` present in `template` with its value; tokens
    /// with no entry in the map are left intact.
    pub fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.slots {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_tokens_and_keeps_unknown_intact() {
        let map = PlaceholderMap::new()
            .with("first_name", "Ana")
            .with("position_title", "Backend Engineer");
        let rendered = map.render("Hi {first_name}, re: {position_title}. Ref {application_pk}.");
        assert_eq!(
            rendered,
            "Hi Ana, re: Backend Engineer. Ref {application_pk}."
        );
    }
}
