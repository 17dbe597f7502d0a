use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("message could not be delivered: {0}")]
    SendFailed(String),

    #[error("transport not configured: {0}")]
    NotConfigured(String),

    #[error("message template #{0} not found")]
    TemplateNotFound(i64),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error(transparent)]
    State(#[from] recruitflow_state::StateError),

    #[error(transparent)]
    Candidate(#[from] recruitflow_candidates::CandidateError),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
