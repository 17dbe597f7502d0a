use thiserror::Error;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Candidate not found: {0}")]
    NotFound(String),

    #[error("Position not found: {0}")]
    PositionNotFound(i64),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Invalid candidate: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CandidateError>;
