use serde::{Deserialize, Serialize};

/// The five fixed periodic jobs the scheduler drives (spec §4.2's job
/// table). Unlike the teacher's user-defined `Schedule` enum, this set is
/// closed — RecruitFlow does not let operators define arbitrary jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    DispatchCalls,
    ReconcileStuckCalls,
    AdvanceCvFollowups,
    CloseStaleRejected,
    PollCvMailbox,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::DispatchCalls => "dispatch_calls",
            JobName::ReconcileStuckCalls => "reconcile_stuck_calls",
            JobName::AdvanceCvFollowups => "advance_cv_followups",
            JobName::CloseStaleRejected => "close_stale_rejected",
            JobName::PollCvMailbox => "poll_cv_mailbox",
        }
    }

    /// Cadence per spec §4.2's job table.
    pub fn interval(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            JobName::DispatchCalls => Duration::from_secs(5 * 60),
            JobName::ReconcileStuckCalls => Duration::from_secs(10 * 60),
            JobName::AdvanceCvFollowups => Duration::from_secs(60 * 60),
            JobName::CloseStaleRejected => Duration::from_secs(24 * 60 * 60),
            JobName::PollCvMailbox => Duration::from_secs(15 * 60),
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed job run, persisted for operator visibility (spec §9's
/// "stuck-in-SCORING metric" style of logged-but-not-alerted observability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub ok: bool,
    pub detail: Option<String>,
}
