//! `advance_cv_followups` (spec §4.2.3, hourly): pushes qualified
//! applications still waiting on a CV through `AWAITING_CV` →
//! `CV_FOLLOWUP_1` → `CV_FOLLOWUP_2` → `CV_OVERDUE`, sending a follow-up
//! message at each of the first two steps.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;

use recruitflow_candidates::get_candidate;
use recruitflow_candidates::get_position;
use recruitflow_messaging::{most_recent_sent_at, send_followup, Channel, MessageType};
use recruitflow_state::{list_applications_by_status, most_recent_transition_into, transition, ApplicationStatus, SidebarCache};

use crate::error::Result;

/// `(from, to, message sent on the way out of `from`)` — `None` for the
/// final step, which only closes the loop with `CV_OVERDUE`.
const STEPS: [(ApplicationStatus, ApplicationStatus, Option<MessageType>); 3] = [
    (ApplicationStatus::AwaitingCv, ApplicationStatus::CvFollowup1, Some(MessageType::CvFollowup1)),
    (ApplicationStatus::CvFollowup1, ApplicationStatus::CvFollowup2, Some(MessageType::CvFollowup2)),
    (ApplicationStatus::CvFollowup2, ApplicationStatus::CvOverdue, None),
];

pub async fn run(conn: &mut Connection, cache: &SidebarCache, whatsapp: &dyn Channel, email: &dyn Channel) -> Result<()> {
    let now = Utc::now();

    for (from_status, to_status, message_type) in STEPS {
        for app in list_applications_by_status(conn, from_status)? {
            if app.qualified != Some(true) || app.cv_received_at.is_some() {
                continue;
            }
            let Some(position) = get_position(conn, app.position_id)? else { continue };

            let baseline = most_recent_sent_at(conn, app.id)?
                .or(most_recent_transition_into(conn, app.id, from_status)?)
                .unwrap_or_else(|| app.updated_at.clone());
            let baseline_at = DateTime::parse_from_rfc3339(&baseline)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);
            let due_at = baseline_at + chrono::Duration::hours(position.follow_up_interval_hours);
            if now < due_at {
                continue;
            }

            if let Some(message_type) = message_type {
                let Some(candidate) = get_candidate(conn, app.candidate_id)? else { continue };
                if let Err(e) = send_followup(conn, whatsapp, email, &app, &candidate, &position, message_type).await {
                    warn!(application_id = app.id, error = %e, "follow-up send failed, leaving status unchanged");
                    continue;
                }
            }

            if let Err(e) = transition(conn, cache, app.id, to_status, None, Some("follow-up interval elapsed")) {
                warn!(application_id = app.id, error = %e, "failed to advance follow-up status");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitflow_candidates::{create_candidate, create_position, init_db as init_candidates_db};
    use recruitflow_messaging::{init_db as init_messaging_db, SendOutcome};
    use recruitflow_state::{create_application, get_application, init_db as init_state_db};
    use std::collections::HashMap;

    struct StubChannel;

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _to: &str, _subject: Option<&str>, _body: &str) -> std::result::Result<SendOutcome, recruitflow_messaging::MessagingError> {
            Ok(SendOutcome { external_id: Some("ext-1".into()) })
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_candidates_db(&conn).unwrap();
        init_state_db(&conn).unwrap();
        init_messaging_db(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn overdue_awaiting_cv_application_advances_and_sends_followup() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate =
            create_candidate(&conn, "Ana", "Silva", Some("+5511988887777"), Some("ana@x.com"), None, None, HashMap::new()).unwrap();
        let position = create_position(&conn, "Driver", "").unwrap();
        conn.execute("UPDATE positions SET follow_up_interval_hours = 1 WHERE id = ?1", [position.id]).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute(
            "UPDATE applications SET status = 'AWAITING_CV', qualified = 1, updated_at = '2020-01-01T00:00:00Z' WHERE id = ?1",
            [app.id],
        )
        .unwrap();

        let wa = StubChannel;
        let email = StubChannel;
        run(&mut conn, &cache, &wa, &email).await.unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::CvFollowup1);
    }

    #[tokio::test]
    async fn not_yet_due_application_is_untouched() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate =
            create_candidate(&conn, "Ben", "Lopez", Some("+5511900000000"), None, None, None, HashMap::new()).unwrap();
        let position = create_position(&conn, "Driver", "").unwrap();
        conn.execute("UPDATE positions SET follow_up_interval_hours = 24 WHERE id = ?1", [position.id]).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute("UPDATE applications SET status = 'AWAITING_CV', qualified = 1 WHERE id = ?1", [app.id]).unwrap();

        let wa = StubChannel;
        let email = StubChannel;
        run(&mut conn, &cache, &wa, &email).await.unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::AwaitingCv);
    }

    #[tokio::test]
    async fn final_step_advances_to_overdue_without_sending() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate =
            create_candidate(&conn, "Cid", "Reyes", Some("+5511911111111"), None, None, None, HashMap::new()).unwrap();
        let position = create_position(&conn, "Driver", "").unwrap();
        conn.execute("UPDATE positions SET follow_up_interval_hours = 1 WHERE id = ?1", [position.id]).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute(
            "UPDATE applications SET status = 'CV_FOLLOWUP_2', qualified = 1, updated_at = '2020-01-01T00:00:00Z' WHERE id = ?1",
            [app.id],
        )
        .unwrap();

        let wa = StubChannel;
        let email = StubChannel;
        run(&mut conn, &cache, &wa, &email).await.unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::CvOverdue);
    }
}
