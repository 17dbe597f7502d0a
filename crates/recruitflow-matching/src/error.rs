use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("CVUpload #{0} not found")]
    CvUploadNotFound(i64),

    #[error("UnmatchedInbound #{0} not found")]
    UnmatchedNotFound(i64),

    #[error("application #{0} not found")]
    ApplicationNotFound(i64),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("CV storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    State(#[from] recruitflow_state::StateError),

    #[error(transparent)]
    Candidate(#[from] recruitflow_candidates::CandidateError),

    #[error(transparent)]
    Provider(#[from] recruitflow_eval::ProviderError),

    #[error("CV content extraction response missing required fields")]
    ExtractionUnparseable,
}

pub type Result<T> = std::result::Result<T, MatchingError>;
