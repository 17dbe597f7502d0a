use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecruitflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Signature validation failed: {0}")]
    SignatureInvalid(String),

    #[error("Upstream service error ({service}): {detail}")]
    Upstream { service: String, detail: String },

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("LLM response could not be parsed: {0}")]
    LlmResponseUnparseable(String),

    #[error("LLM response was truncated: {0}")]
    LlmResponseTruncated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for RecruitflowError {
    fn from(e: rusqlite::Error) -> Self {
        RecruitflowError::Database(e.to_string())
    }
}

impl RecruitflowError {
    /// Short error code returned in webhook/API JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RecruitflowError::Config(_) => "CONFIG_ERROR",
            RecruitflowError::Database(_) => "DATABASE_ERROR",
            RecruitflowError::Validation(_) => "VALIDATION_ERROR",
            RecruitflowError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            RecruitflowError::Upstream { .. } => "UPSTREAM_ERROR",
            RecruitflowError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            RecruitflowError::LlmResponseUnparseable(_) => "LLM_RESPONSE_UNPARSEABLE",
            RecruitflowError::LlmResponseTruncated(_) => "LLM_RESPONSE_TRUNCATED",
            RecruitflowError::NotFound(_) => "NOT_FOUND",
            RecruitflowError::Serialization(_) => "SERIALIZATION_ERROR",
            RecruitflowError::Io(_) => "IO_ERROR",
            RecruitflowError::Timeout { .. } => "TIMEOUT",
            RecruitflowError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RecruitflowError>;
