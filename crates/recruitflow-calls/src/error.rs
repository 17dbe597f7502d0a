use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("Call not found: {0}")]
    NotFound(i64),

    #[error("voice-agent is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("candidate #{0} has no phone number")]
    MissingPhone(i64),

    #[error("voice-agent request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("voice-agent returned an error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("voice-agent batch response carried no batch id: {0}")]
    MissingBatchId(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    State(#[from] recruitflow_state::StateError),
}

pub type Result<T> = std::result::Result<T, CallError>;
