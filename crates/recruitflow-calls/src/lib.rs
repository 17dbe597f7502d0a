//! Call records, the voice-agent dispatcher (single + batch), and the
//! reducer shared by the webhook and scheduler-reconciliation paths.

pub mod crud;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod reducer;
pub mod types;

pub use crud::*;
pub use db::init_db;
pub use dispatch::{CallCandidate, VoiceAgentClient, BATCH_CHUNK_SIZE};
pub use error::{CallError, Result};
pub use reducer::{apply_call_result, escalate_orphan_call};
pub use types::{Call, CallStatus};
