//! Candidate and Position persistence: the people being screened and the
//! roles they're screened for.

pub mod crud;
pub mod db;
pub mod error;
pub mod types;

pub use crud::*;
pub use db::init_db;
pub use error::{CandidateError, Result};
pub use types::{Candidate, Position, PositionStatus};
