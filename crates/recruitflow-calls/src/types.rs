use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Initiated,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Busy,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiated => "INITIATED",
            CallStatus::InProgress => "IN_PROGRESS",
            CallStatus::Completed => "COMPLETED",
            CallStatus::Failed => "FAILED",
            CallStatus::NoAnswer => "NO_ANSWER",
            CallStatus::Busy => "BUSY",
        }
    }

    /// A call in a terminal status cannot be transitioned further (spec §3).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Initiated | CallStatus::InProgress)
    }

    /// Map an external voice-agent status string to the internal enum.
    /// Unknown values default to `IN_PROGRESS` (spec §4.3 / §9).
    pub fn from_external(raw: &str) -> CallStatus {
        match raw.to_lowercase().as_str() {
            "done" | "completed" => CallStatus::Completed,
            "failed" => CallStatus::Failed,
            "no_answer" => CallStatus::NoAnswer,
            "busy" => CallStatus::Busy,
            "in_progress" | "processing" => CallStatus::InProgress,
            _ => CallStatus::InProgress,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "INITIATED" => CallStatus::Initiated,
            "IN_PROGRESS" => CallStatus::InProgress,
            "COMPLETED" => CallStatus::Completed,
            "FAILED" => CallStatus::Failed,
            "NO_ANSWER" => CallStatus::NoAnswer,
            "BUSY" => CallStatus::Busy,
            other => return Err(other.to_string()),
        })
    }
}

/// One outbound call attempt (spec §3 — Call). Exactly one of
/// `external_conversation_id` / `external_batch_id` is set at creation; the
/// conversation id may be filled in later by late-binding (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: i64,
    pub application_id: i64,
    pub attempt_number: u32,
    pub status: CallStatus,
    pub external_conversation_id: Option<String>,
    pub external_batch_id: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub summary_title: Option<String>,
    pub recording_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub initiated_at: String,
    pub ended_at: Option<String>,
}
