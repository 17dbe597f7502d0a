use async_trait::async_trait;

/// Request to the evaluation LLM: a single system + user turn (spec §4.5 —
/// no conversation history, no tool use).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Response from the evaluation LLM.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// Provider's stop reason. `"max_tokens"` signals truncation and must be
    /// surfaced as an explicit error (spec §4.5, §6).
    pub stop_reason: String,
}

/// Common interface for the LLM used by the evaluation adapter. Intentionally
/// provider-agnostic — no vendor name or model family is assumed here.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
