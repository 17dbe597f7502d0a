use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::cache::SidebarCache;
use crate::db::{row_to_application, row_to_status_change};
use crate::error::{Result, StateError};
use crate::types::{Application, ApplicationStatus, StatusChange};

const APPLICATION_BASE_SQL: &str = "SELECT id, candidate_id, position_id, status, qualified, score,
            score_notes, cv_received_at, callback_scheduled_at, needs_human_reason,
            created_at, updated_at
     FROM applications";
const APPLICATION_SELECT_SQL: &str = "SELECT id, candidate_id, position_id, status, qualified, score,
            score_notes, cv_received_at, callback_scheduled_at, needs_human_reason,
            created_at, updated_at
     FROM applications WHERE id = ?1";

/// Create a new Application at `PENDING_CALL` (spec §4.1 lifecycle — created
/// at lead import). The `(candidate_id, position_id)` UNIQUE constraint
/// enforces the §3 invariant at the database level.
pub fn create_application(conn: &Connection, candidate_id: i64, position_id: i64) -> Result<Application> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO applications (candidate_id, position_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![candidate_id, position_id, ApplicationStatus::PendingCall.as_str(), now],
    )?;
    let id = conn.last_insert_rowid();
    get_application(conn, id)?.ok_or(StateError::NotFound(id))
}

pub fn get_application(conn: &Connection, id: i64) -> Result<Option<Application>> {
    let mut stmt = conn.prepare(APPLICATION_SELECT_SQL)?;
    match stmt.query_row(params![id], row_to_application) {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StateError::DatabaseError(e)),
    }
}

/// Applications for `candidate_id` currently in the awaiting-CV set (spec
/// §4.4's match-outcome rule — the fan-out target of a CV match).
pub fn list_awaiting_cv_applications(conn: &Connection, candidate_id: i64) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!("{APPLICATION_BASE_SQL} WHERE candidate_id = ?1"))?;
    let rows = stmt
        .query_map(params![candidate_id], row_to_application)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().filter(|a| a.status.is_awaiting_cv()).collect())
}

/// Distinct candidate ids with at least one application in the awaiting-CV
/// set — the fuzzy-name matching pool for spec §4.4 priority 4/5.
pub fn candidate_ids_awaiting_cv(conn: &Connection) -> Result<Vec<i64>> {
    let statuses: Vec<&str> = ApplicationStatus::AWAITING_CV_SET.iter().map(|s| s.as_str()).collect();
    let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql =
        format!("SELECT DISTINCT candidate_id FROM applications WHERE status IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(statuses.iter()), |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All applications currently in `status` — the scheduler's basic polling
/// query (spec §4.2.1/§4.2.3/§4.2.4).
pub fn list_applications_by_status(conn: &Connection, status: ApplicationStatus) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!("{APPLICATION_BASE_SQL} WHERE status = ?1"))?;
    let rows = stmt
        .query_map(params![status.as_str()], row_to_application)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Applications in `CALLBACK_SCHEDULED` whose callback time has arrived
/// (spec §4.2.1's callback queue).
pub fn list_due_callbacks(conn: &Connection, now_rfc3339: &str) -> Result<Vec<Application>> {
    let mut stmt = conn.prepare(&format!(
        "{APPLICATION_BASE_SQL} WHERE status = ?1 AND callback_scheduled_at IS NOT NULL AND callback_scheduled_at <= ?2"
    ))?;
    let rows = stmt
        .query_map(params![ApplicationStatus::CallbackScheduled.as_str(), now_rfc3339], row_to_application)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `changed_at` of the most recent StatusChange whose `to_status` matches
/// `status` — the baseline-time fallback used by `advance_cv_followups` and
/// `close_stale_rejected` (spec §4.2.3/§4.2.4) when no sent message exists.
pub fn most_recent_transition_into(
    conn: &Connection,
    application_id: i64,
    status: ApplicationStatus,
) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT changed_at FROM status_changes
         WHERE application_id = ?1 AND to_status = ?2
         ORDER BY changed_at DESC, id DESC LIMIT 1",
    )?;
    let changed_at = stmt
        .query_row(params![application_id, status.as_str()], |row| row.get(0))
        .optional()?;
    Ok(changed_at)
}

pub fn list_status_changes(conn: &Connection, application_id: i64) -> Result<Vec<StatusChange>> {
    let mut stmt = conn.prepare(
        "SELECT id, application_id, from_status, to_status, actor, note, changed_at
         FROM status_changes WHERE application_id = ?1 ORDER BY changed_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![application_id], row_to_status_change)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The single authority for Application.status transitions (spec §4.1).
///
/// If `new_status == current`, this is a no-op and produces no audit entry —
/// use [`add_note`] to record a timeline note without a status change.
/// Otherwise the status write and the StatusChange insert happen inside one
/// immediate transaction, and the sidebar cache is invalidated before the
/// transaction commits.
pub fn transition(
    conn: &mut Connection,
    cache: &SidebarCache,
    application_id: i64,
    new_status: ApplicationStatus,
    actor: Option<&str>,
    note: Option<&str>,
) -> Result<Application> {
    transition_with(conn, cache, application_id, new_status, actor, note, |_, _| Ok(()))
}

/// The status-write + audit-insert half of [`transition`], with no
/// transaction management of its own — for callers that already hold a row
/// lock (an open immediate transaction) and need to compose the transition
/// with writes to other tables in the same atomic unit (e.g. the evaluation
/// adapter inserting an Evaluation row alongside the outcome transition,
/// spec §4.5). A no-op when `new_status == current`, same as `transition`.
pub fn write_transition(
    conn: &Connection,
    application_id: i64,
    new_status: ApplicationStatus,
    actor: Option<&str>,
    note: Option<&str>,
) -> Result<Application> {
    let current = get_application(conn, application_id)?.ok_or(StateError::NotFound(application_id))?;
    if current.status == new_status {
        return Ok(current);
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE applications SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![application_id, new_status.as_str(), now],
    )?;
    conn.execute(
        "INSERT INTO status_changes (application_id, from_status, to_status, actor, note, changed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![application_id, current.status.as_str(), new_status.as_str(), actor, note, now],
    )?;
    get_application(conn, application_id)?.ok_or(StateError::NotFound(application_id))
}

/// Same contract as [`transition`], but runs `side_effect` inside the same
/// atomic unit before the status write — this is how callers compose
/// adjacent-field updates (`cv_received_at`, `callback_scheduled_at`,
/// `needs_human_reason`) with the transition itself, per spec §4.1's
/// requirement that partial commits be impossible.
pub fn transition_with<F>(
    conn: &mut Connection,
    cache: &SidebarCache,
    application_id: i64,
    new_status: ApplicationStatus,
    actor: Option<&str>,
    note: Option<&str>,
    side_effect: F,
) -> Result<Application>
where
    F: FnOnce(&Connection, i64) -> Result<()>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    side_effect(&tx, application_id)?;
    write_transition(&tx, application_id, new_status, actor, note)?;
    tx.commit()?;
    cache.invalidate();
    get_application(conn, application_id)?.ok_or(StateError::NotFound(application_id))
}

/// Record a free-text timeline note with no status change (spec §4.1 — a
/// StatusChange with `from_status == to_status`).
pub fn add_note(conn: &Connection, application_id: i64, actor: Option<&str>, note: &str) -> Result<()> {
    let current = get_application(conn, application_id)?.ok_or(StateError::NotFound(application_id))?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO status_changes (application_id, from_status, to_status, actor, note, changed_at)
         VALUES (?1, ?2, ?2, ?3, ?4, ?5)",
        params![application_id, current.status.as_str(), actor, note, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn same_status_transition_is_a_silent_no_op() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        transition(&mut conn, &cache, app.id, ApplicationStatus::PendingCall, None, None).unwrap();
        let changes = list_status_changes(&conn, app.id).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn transition_writes_one_audit_row() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        let updated = transition(
            &mut conn,
            &cache,
            app.id,
            ApplicationStatus::CallQueued,
            Some("scheduler"),
            None,
        )
        .unwrap();
        assert_eq!(updated.status, ApplicationStatus::CallQueued);
        let changes = list_status_changes(&conn, app.id).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from_status, ApplicationStatus::PendingCall);
        assert_eq!(changes[0].to_status, ApplicationStatus::CallQueued);
    }

    #[test]
    fn transition_with_composes_field_update_atomically() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        let now = Utc::now().to_rfc3339();
        let updated = transition_with(
            &mut conn,
            &cache,
            app.id,
            ApplicationStatus::CvReceived,
            None,
            None,
            |tx, id| {
                tx.execute(
                    "UPDATE applications SET cv_received_at = ?2 WHERE id = ?1",
                    params![id, now],
                )?;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(updated.status, ApplicationStatus::CvReceived);
        assert!(updated.cv_received_at.is_some());
    }

    #[test]
    fn write_transition_composes_with_a_caller_held_transaction() {
        let mut conn = test_conn();
        let app = create_application(&conn, 1, 1).unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();
        tx.execute("UPDATE applications SET score = ?2 WHERE id = ?1", params![app.id, 80])
            .unwrap();
        let updated = write_transition(&tx, app.id, ApplicationStatus::Qualified, None, None).unwrap();
        tx.commit().unwrap();
        assert_eq!(updated.status, ApplicationStatus::Qualified);
        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.score, Some(80));
    }

    #[test]
    fn awaiting_cv_queries_see_only_the_awaiting_set() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let waiting = create_application(&conn, 1, 1).unwrap();
        transition(&mut conn, &cache, waiting.id, ApplicationStatus::AwaitingCv, None, None).unwrap();
        let not_waiting = create_application(&conn, 1, 2).unwrap();

        let for_candidate = list_awaiting_cv_applications(&conn, 1).unwrap();
        assert_eq!(for_candidate.len(), 1);
        assert_eq!(for_candidate[0].id, waiting.id);

        let pool = candidate_ids_awaiting_cv(&conn).unwrap();
        assert_eq!(pool, vec![1]);
        let _ = not_waiting;
    }

    #[test]
    fn add_note_does_not_change_status() {
        let conn = test_conn();
        let app = create_application(&conn, 1, 1).unwrap();
        add_note(&conn, app.id, Some("ops"), "called candidate to confirm").unwrap();
        let changes = list_status_changes(&conn, app.id).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_note());
    }
}
