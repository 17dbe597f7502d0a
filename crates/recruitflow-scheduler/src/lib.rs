//! `recruitflow-scheduler` — drives the five fixed periodic jobs that keep
//! applications moving without a recruiter's intervention (spec §4.2):
//! dispatching queued calls, reconciling calls the webhook never reported
//! on, advancing CV follow-ups, closing stale rejections, and draining the
//! CV inbox.
//!
//! Unlike a general-purpose job scheduler, the job set is closed — there is
//! no API for defining new jobs, no persisted `next_run`, and no cron
//! parser. Each job's cadence is a compile-time constant
//! ([`types::JobName::interval`]); what IS persisted is a `job_runs`
//! history log for operator visibility into what ran and when.

pub mod db;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use types::{JobName, JobRun};
