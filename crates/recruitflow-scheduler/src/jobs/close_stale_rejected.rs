//! `close_stale_rejected` (spec §4.2.4, daily): closes applications that
//! have sat in a rejected or overdue status past the position's
//! `rejected_cv_timeout_days`, across all three qualifying statuses.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;

use recruitflow_candidates::get_position;
use recruitflow_state::{list_applications_by_status, most_recent_transition_into, transition, Application, ApplicationStatus, SidebarCache};

use crate::error::Result;

fn close_if_due(conn: &mut Connection, cache: &SidebarCache, app: &Application, timeout_days: i64, baseline: &str, now: DateTime<Utc>) -> Result<()> {
    let baseline_at = DateTime::parse_from_rfc3339(baseline)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    let deadline = baseline_at + chrono::Duration::days(timeout_days);
    if now >= deadline {
        transition(conn, cache, app.id, ApplicationStatus::Closed, None, Some("stale rejected/overdue timeout elapsed"))?;
    }
    Ok(())
}

pub fn run(conn: &mut Connection, cache: &SidebarCache) -> Result<()> {
    let now = Utc::now();

    for app in list_applications_by_status(conn, ApplicationStatus::AwaitingCvRejected)? {
        if app.cv_received_at.is_some() {
            continue;
        }
        let Some(position) = get_position(conn, app.position_id)? else { continue };
        let baseline = most_recent_transition_into(conn, app.id, ApplicationStatus::AwaitingCvRejected)?
            .unwrap_or_else(|| app.updated_at.clone());
        if let Err(e) = close_if_due(conn, cache, &app, position.rejected_cv_timeout_days, &baseline, now) {
            warn!(application_id = app.id, error = %e, "failed to close stale awaiting-cv-rejected application");
        }
    }

    for app in list_applications_by_status(conn, ApplicationStatus::CvReceivedRejected)? {
        let Some(cv_received_at) = app.cv_received_at.clone() else { continue };
        let Some(position) = get_position(conn, app.position_id)? else { continue };
        if let Err(e) = close_if_due(conn, cache, &app, position.rejected_cv_timeout_days, &cv_received_at, now) {
            warn!(application_id = app.id, error = %e, "failed to close stale cv-received-rejected application");
        }
    }

    for app in list_applications_by_status(conn, ApplicationStatus::CvOverdue)? {
        let Some(position) = get_position(conn, app.position_id)? else { continue };
        let baseline =
            most_recent_transition_into(conn, app.id, ApplicationStatus::CvOverdue)?.unwrap_or_else(|| app.updated_at.clone());
        if let Err(e) = close_if_due(conn, cache, &app, position.rejected_cv_timeout_days, &baseline, now) {
            warn!(application_id = app.id, error = %e, "failed to close stale overdue application");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruitflow_candidates::{create_candidate, create_position, init_db as init_candidates_db};
    use recruitflow_state::{create_application, get_application, init_db as init_state_db};
    use std::collections::HashMap;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_candidates_db(&conn).unwrap();
        init_state_db(&conn).unwrap();
        conn
    }

    fn position_with_timeout(conn: &Connection, days: i64) -> recruitflow_candidates::Position {
        let position = create_position(conn, "Driver", "").unwrap();
        conn.execute("UPDATE positions SET rejected_cv_timeout_days = ?1 WHERE id = ?2", rusqlite::params![days, position.id])
            .unwrap();
        position
    }

    #[test]
    fn stale_awaiting_cv_rejected_is_closed() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate = create_candidate(&conn, "Ana", "Silva", Some("+5511988887777"), None, None, None, HashMap::new()).unwrap();
        let position = position_with_timeout(&conn, 1);
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute(
            "UPDATE applications SET status = 'AWAITING_CV_REJECTED', updated_at = '2020-01-01T00:00:00Z' WHERE id = ?1",
            [app.id],
        )
        .unwrap();

        run(&mut conn, &cache).unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::Closed);
    }

    #[test]
    fn stale_cv_received_rejected_uses_cv_received_at_as_baseline() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate = create_candidate(&conn, "Ben", "Lopez", Some("+5511900000000"), None, None, None, HashMap::new()).unwrap();
        let position = position_with_timeout(&conn, 1);
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute(
            "UPDATE applications SET status = 'CV_RECEIVED_REJECTED', cv_received_at = '2020-01-01T00:00:00Z',
             updated_at = datetime('now') WHERE id = ?1",
            [app.id],
        )
        .unwrap();

        run(&mut conn, &cache).unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::Closed);
    }

    #[test]
    fn fresh_overdue_application_stays_open() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate = create_candidate(&conn, "Cid", "Reyes", Some("+5511911111111"), None, None, None, HashMap::new()).unwrap();
        let position = position_with_timeout(&conn, 30);
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute("UPDATE applications SET status = 'CV_OVERDUE' WHERE id = ?1", [app.id]).unwrap();

        run(&mut conn, &cache).unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::CvOverdue);
    }
}
