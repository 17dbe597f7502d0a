use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The person behind an application (spec §3 — Candidate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub whatsapp_number: Option<String>,
    /// External lead source identifier (e.g. the ad platform's lead id).
    /// Unique across candidates when present.
    pub lead_source_id: Option<String>,
    /// Free-form screening Q&A captured at lead-import time.
    pub form_answers: HashMap<String, String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Paused,
    Closed,
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PositionStatus::Open => "open",
            PositionStatus::Paused => "paused",
            PositionStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(PositionStatus::Open),
            "paused" => Ok(PositionStatus::Paused),
            "closed" => Ok(PositionStatus::Closed),
            other => Err(format!("unknown position status: {other}")),
        }
    }
}

/// The role being filled (spec §3 — Position). Tuning knobs drive the
/// scheduler (§4.2) and the call dispatcher (§4.2.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: PositionStatus,
    pub qualification_prompt: String,
    pub system_prompt: String,
    pub first_message: String,
    /// `[calling_hour_start, calling_hour_end)`, 0-23. A misconfigured
    /// window (start >= end) is treated as "skip with warning" by the
    /// dispatcher, not a hard validation failure here.
    pub calling_hour_start: u8,
    pub calling_hour_end: u8,
    pub call_retry_max: u32,
    pub call_retry_interval_minutes: i64,
    pub follow_up_interval_hours: i64,
    pub rejected_cv_timeout_days: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Position {
    /// A calling window is well-formed when start < end (spec §4.2.1).
    pub fn has_valid_calling_window(&self) -> bool {
        self.calling_hour_start < self.calling_hour_end
    }

    /// Whether `hour` (0-23, in the scheduler's configured timezone) falls
    /// inside `[calling_hour_start, calling_hour_end)`.
    pub fn is_within_calling_hours(&self, hour: u32) -> bool {
        self.has_valid_calling_window()
            && hour >= self.calling_hour_start as u32
            && hour < self.calling_hour_end as u32
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}
