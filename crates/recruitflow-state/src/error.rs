use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Application not found: {0}")]
    NotFound(i64),

    #[error("Unknown application status: {0}")]
    UnknownStatus(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub type Result<T> = std::result::Result<T, StateError>;
