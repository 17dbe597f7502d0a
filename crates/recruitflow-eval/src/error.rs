use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("call #{0} has no transcript")]
    MissingTranscript(i64),

    #[error("LLM provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("LLM response could not be parsed as JSON: {0}")]
    Unparseable(String),

    #[error("LLM response was truncated (hit the max_tokens limit): {0}")]
    Truncated(String),

    #[error("LLM evaluation response missing required fields: {0:?}")]
    MissingFields(Vec<&'static str>),

    #[error("LLM returned unknown outcome: {0}")]
    UnknownOutcome(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    State(#[from] recruitflow_state::StateError),

    #[error(transparent)]
    Call(#[from] recruitflow_calls::CallError),
}

pub type Result<T> = std::result::Result<T, EvalError>;
