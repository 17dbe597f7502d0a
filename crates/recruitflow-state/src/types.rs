use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The 20 states an Application can occupy (spec §4.1). Grouped in comments
/// to match the narrative grouping; the enum itself is flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    // Pre-call
    PendingCall,
    CallQueued,
    // In-call
    CallInProgress,
    CallCompleted,
    CallFailed,
    // Scoring
    Scoring,
    // Qualified branch
    Qualified,
    AwaitingCv,
    CvFollowup1,
    CvFollowup2,
    CvOverdue,
    CvReceived,
    // Not-qualified branch
    NotQualified,
    AwaitingCvRejected,
    CvReceivedRejected,
    // Special
    CallbackScheduled,
    NeedsHuman,
    // Terminal
    Closed,
}

impl ApplicationStatus {
    pub const AWAITING_CV_SET: [ApplicationStatus; 5] = [
        ApplicationStatus::AwaitingCv,
        ApplicationStatus::CvFollowup1,
        ApplicationStatus::CvFollowup2,
        ApplicationStatus::CvOverdue,
        ApplicationStatus::AwaitingCvRejected,
    ];

    /// Whether a CV submission arriving now would advance this application
    /// (the "awaiting-CV set" of the glossary).
    pub fn is_awaiting_cv(&self) -> bool {
        Self::AWAITING_CV_SET.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Closed)
    }

    /// The received-state to transition to when a CV arrives while in this
    /// awaiting-CV status (spec §4.4's match-outcome rule).
    pub fn cv_received_target(&self) -> Option<ApplicationStatus> {
        match self {
            ApplicationStatus::AwaitingCvRejected => Some(ApplicationStatus::CvReceivedRejected),
            s if s.is_awaiting_cv() => Some(ApplicationStatus::CvReceived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::PendingCall => "PENDING_CALL",
            ApplicationStatus::CallQueued => "CALL_QUEUED",
            ApplicationStatus::CallInProgress => "CALL_IN_PROGRESS",
            ApplicationStatus::CallCompleted => "CALL_COMPLETED",
            ApplicationStatus::CallFailed => "CALL_FAILED",
            ApplicationStatus::Scoring => "SCORING",
            ApplicationStatus::Qualified => "QUALIFIED",
            ApplicationStatus::AwaitingCv => "AWAITING_CV",
            ApplicationStatus::CvFollowup1 => "CV_FOLLOWUP_1",
            ApplicationStatus::CvFollowup2 => "CV_FOLLOWUP_2",
            ApplicationStatus::CvOverdue => "CV_OVERDUE",
            ApplicationStatus::CvReceived => "CV_RECEIVED",
            ApplicationStatus::NotQualified => "NOT_QUALIFIED",
            ApplicationStatus::AwaitingCvRejected => "AWAITING_CV_REJECTED",
            ApplicationStatus::CvReceivedRejected => "CV_RECEIVED_REJECTED",
            ApplicationStatus::CallbackScheduled => "CALLBACK_SCHEDULED",
            ApplicationStatus::NeedsHuman => "NEEDS_HUMAN",
            ApplicationStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "PENDING_CALL" => ApplicationStatus::PendingCall,
            "CALL_QUEUED" => ApplicationStatus::CallQueued,
            "CALL_IN_PROGRESS" => ApplicationStatus::CallInProgress,
            "CALL_COMPLETED" => ApplicationStatus::CallCompleted,
            "CALL_FAILED" => ApplicationStatus::CallFailed,
            "SCORING" => ApplicationStatus::Scoring,
            "QUALIFIED" => ApplicationStatus::Qualified,
            "AWAITING_CV" => ApplicationStatus::AwaitingCv,
            "CV_FOLLOWUP_1" => ApplicationStatus::CvFollowup1,
            "CV_FOLLOWUP_2" => ApplicationStatus::CvFollowup2,
            "CV_OVERDUE" => ApplicationStatus::CvOverdue,
            "CV_RECEIVED" => ApplicationStatus::CvReceived,
            "NOT_QUALIFIED" => ApplicationStatus::NotQualified,
            "AWAITING_CV_REJECTED" => ApplicationStatus::AwaitingCvRejected,
            "CV_RECEIVED_REJECTED" => ApplicationStatus::CvReceivedRejected,
            "CALLBACK_SCHEDULED" => ApplicationStatus::CallbackScheduled,
            "NEEDS_HUMAN" => ApplicationStatus::NeedsHuman,
            "CLOSED" => ApplicationStatus::Closed,
            other => return Err(other.to_string()),
        })
    }
}

/// Tri-state qualification verdict (spec §3 — `qualified` is non-null only
/// after an evaluation has been recorded).
pub type Qualified = Option<bool>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub candidate_id: i64,
    pub position_id: i64,
    pub status: ApplicationStatus,
    pub qualified: Qualified,
    pub score: Option<i32>,
    pub score_notes: Option<String>,
    pub cv_received_at: Option<String>,
    pub callback_scheduled_at: Option<String>,
    pub needs_human_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable audit-log entry (spec §3 — StatusChange). `from_status ==
/// to_status` is the representation of a free-text timeline note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: i64,
    pub application_id: i64,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub actor: Option<String>,
    pub note: Option<String>,
    pub changed_at: String,
}

impl StatusChange {
    /// Whether this row is a plain note rather than an actual transition.
    pub fn is_note(&self) -> bool {
        self.from_status == self.to_status
    }
}
