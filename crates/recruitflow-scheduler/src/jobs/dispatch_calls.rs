//! `dispatch_calls` (spec §4.2.1, every 5 minutes): submits the
//! `CALL_QUEUED` backlog as one batch request, then attempts every due
//! `CALLBACK_SCHEDULED` application as a single call.

use chrono::{Timelike, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;
use tracing::{info, warn};

use recruitflow_calls::{CallCandidate, VoiceAgentClient};
use recruitflow_candidates::{get_candidate, get_position, Candidate, Position};
use recruitflow_state::{list_applications_by_status, list_due_callbacks, transition, Application, ApplicationStatus, SidebarCache};

use crate::error::Result;

fn current_hour(timezone: &str) -> u32 {
    match timezone.parse::<Tz>() {
        Ok(tz) => Utc::now().with_timezone(&tz).hour(),
        Err(_) => {
            warn!(timezone, "unknown scheduler timezone, falling back to UTC");
            Utc::now().hour()
        }
    }
}

/// Resolve an application's candidate and position, dropping it (with a
/// warning) if either has gone missing.
fn resolve(conn: &Connection, app: &Application) -> Option<(Candidate, Position)> {
    let candidate = match get_candidate(conn, app.candidate_id) {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!(application_id = app.id, "candidate missing for queued application");
            return None;
        }
        Err(e) => {
            warn!(application_id = app.id, error = %e, "failed to load candidate");
            return None;
        }
    };
    let position = match get_position(conn, app.position_id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            warn!(application_id = app.id, "position missing for queued application");
            return None;
        }
        Err(e) => {
            warn!(application_id = app.id, error = %e, "failed to load position");
            return None;
        }
    };
    Some((candidate, position))
}

pub async fn run(conn: &mut Connection, cache: &SidebarCache, voice_agent: &VoiceAgentClient, timezone: &str) -> Result<()> {
    let hour = current_hour(timezone);

    let queued = list_applications_by_status(conn, ApplicationStatus::CallQueued)?;
    let resolved: Vec<(Application, Candidate, Position)> = queued
        .into_iter()
        .filter_map(|app| resolve(conn, &app).map(|(c, p)| (app, c, p)))
        .collect();

    let mut eligible = Vec::new();
    for (app, candidate, position) in &resolved {
        if !position.is_open() {
            continue;
        }
        if !position.is_within_calling_hours(hour) {
            if !position.has_valid_calling_window() {
                warn!(position_id = position.id, "position has an invalid calling-hours window, skipping");
            }
            continue;
        }
        eligible.push(CallCandidate { application_id: app.id, candidate, position });
    }

    if !eligible.is_empty() {
        let count = eligible.len();
        match voice_agent.dispatch_batch(conn, cache, &eligible).await {
            Ok(calls) => info!(submitted = count, created = calls.len(), "batch calls dispatched"),
            Err(e) => {
                warn!(error = %e, "batch submission failed outright, failing the still-queued applications");
                for item in &eligible {
                    let _ = transition(conn, cache, item.application_id, ApplicationStatus::CallFailed, None, Some("batch submission failed"));
                }
            }
        }
    }

    let now_str = Utc::now().to_rfc3339();
    let due = list_due_callbacks(conn, &now_str)?;
    for app in due {
        let Some((candidate, position)) = resolve(conn, &app) else { continue };
        if !position.is_open() || !position.is_within_calling_hours(hour) {
            continue;
        }
        let item = CallCandidate { application_id: app.id, candidate: &candidate, position: &position };
        match voice_agent.dispatch_single(conn, cache, &item).await {
            Ok(call) => info!(call_id = call.id, application_id = app.id, "callback dispatched"),
            Err(e) => {
                warn!(application_id = app.id, error = %e, "callback dispatch failed");
                let _ = transition(conn, cache, app.id, ApplicationStatus::CallFailed, None, Some("callback dispatch failed"));
            }
        }
    }

    Ok(())
}
