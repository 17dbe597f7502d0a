//! LLM-based fallback extraction of candidate identity fields from raw CV
//! text, used as cascade priority 5 when no structural signal (email,
//! phone, reference id, display name) matched (spec §4.4, ported from
//! `original_source/cvs/services.py::extract_cv_data_via_haiku`).

use recruitflow_core::text::strip_json_fence;
use recruitflow_eval::json_repair;
use recruitflow_eval::{ChatRequest, LlmProvider};
use serde::Deserialize;

use crate::error::{MatchingError, Result};

const MAX_TOKENS: u32 = 512;
const SYSTEM_PROMPT: &str = "You extract contact details from a CV or resume. Respond with a single JSON \
object and nothing else, with exactly these keys: first_name, last_name, email, phone. Use null for any \
field you cannot find with confidence. Do not guess.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ExtractedContact {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

pub async fn extract_contact(provider: &dyn LlmProvider, model: &str, cv_text: &str) -> Result<ExtractedContact> {
    let req = ChatRequest {
        model: model.to_string(),
        system: SYSTEM_PROMPT.to_string(),
        user: cv_text.to_string(),
        max_tokens: MAX_TOKENS,
    };
    let resp = provider.send(&req).await.map_err(MatchingError::Provider)?;

    let stripped = strip_json_fence(&resp.content);
    let value: serde_json::Value = serde_json::from_str(&stripped)
        .or_else(|_| serde_json::from_str(&json_repair::repair(&stripped)))
        .map_err(|_| MatchingError::ExtractionUnparseable)?;

    serde_json::from_value(value).map_err(|_| MatchingError::ExtractionUnparseable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitflow_eval::{ChatResponse, ProviderError};

    struct StubProvider(&'static str);

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse { content: self.0.to_string(), tokens_in: 10, tokens_out: 10, stop_reason: "end_turn".into() })
        }
    }

    #[tokio::test]
    async fn extracts_fields_from_fenced_json() {
        let provider = StubProvider(
            "```json\n{\"first_name\":\"Ana\",\"last_name\":\"Reyes\",\"email\":\"ana@x.com\",\"phone\":null}\n```",
        );
        let contact = extract_contact(&provider, "claude-haiku", "cv text").await.unwrap();
        assert_eq!(contact.first_name.as_deref(), Some("Ana"));
        assert_eq!(contact.phone, None);
        assert!(!contact.is_empty());
    }

    #[tokio::test]
    async fn repairs_trailing_comma_before_failing() {
        let provider = StubProvider("{\"first_name\":\"Ana\",\"last_name\":null,\"email\":null,\"phone\":null,}");
        let contact = extract_contact(&provider, "claude-haiku", "cv text").await.unwrap();
        assert_eq!(contact.first_name.as_deref(), Some("Ana"));
    }
}
