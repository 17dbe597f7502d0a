//! One module per fixed job (spec §4.2's job table). Each `run` function
//! takes exactly the dependencies that job needs, so the engine can wire
//! them up without a god-object context struct.

pub mod advance_cv_followups;
pub mod close_stale_rejected;
pub mod dispatch_calls;
pub mod poll_cv_mailbox;
pub mod reconcile_stuck_calls;
