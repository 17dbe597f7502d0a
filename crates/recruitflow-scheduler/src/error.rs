use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    State(#[from] recruitflow_state::StateError),

    #[error(transparent)]
    Candidate(#[from] recruitflow_candidates::CandidateError),

    #[error(transparent)]
    Call(#[from] recruitflow_calls::CallError),

    #[error(transparent)]
    Eval(#[from] recruitflow_eval::EvalError),

    #[error(transparent)]
    Matching(#[from] recruitflow_matching::MatchingError),

    #[error(transparent)]
    Messaging(#[from] recruitflow_messaging::MessagingError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
