use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::row_to_call;
use crate::error::{CallError, Result};
use crate::types::{Call, CallStatus};

const CALL_SELECT_SQL: &str = "SELECT id, application_id, attempt_number, status,
            external_conversation_id, external_batch_id, transcript, summary,
            summary_title, recording_url, duration_seconds, initiated_at, ended_at
     FROM calls WHERE id = ?1";

pub fn next_attempt_number(conn: &Connection, application_id: i64) -> Result<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM calls WHERE application_id = ?1",
        params![application_id],
        |row| row.get(0),
    )?;
    Ok(count + 1)
}

pub fn get_call(conn: &Connection, id: i64) -> Result<Option<Call>> {
    let mut stmt = conn.prepare(CALL_SELECT_SQL)?;
    match stmt.query_row(params![id], row_to_call) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CallError::DatabaseError(e)),
    }
}

const CALL_SELECT_BY_CONVERSATION_ID_SQL: &str = "SELECT id, application_id, attempt_number, status,
            external_conversation_id, external_batch_id, transcript, summary,
            summary_title, recording_url, duration_seconds, initiated_at, ended_at
     FROM calls WHERE external_conversation_id = ?1";

pub fn get_call_by_conversation_id(conn: &Connection, conversation_id: &str) -> Result<Option<Call>> {
    let mut stmt = conn.prepare(CALL_SELECT_BY_CONVERSATION_ID_SQL)?;
    match stmt.query_row(params![conversation_id], row_to_call) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CallError::DatabaseError(e)),
    }
}

/// Create a Call for a single (non-batch) dispatch — `external_conversation_id`
/// is known immediately.
pub fn create_call_with_conversation_id(
    conn: &Connection,
    application_id: i64,
    attempt_number: u32,
    conversation_id: &str,
) -> Result<Call> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO calls (application_id, attempt_number, status, external_conversation_id, initiated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![application_id, attempt_number, CallStatus::Initiated.as_str(), conversation_id, now],
    )?;
    let id = conn.last_insert_rowid();
    get_call(conn, id)?.ok_or(CallError::NotFound(id))
}

/// Create a Call for a batch dispatch — only `external_batch_id` is known;
/// `external_conversation_id` arrives later via late-binding (spec §4.3).
pub fn create_call_with_batch_id(
    conn: &Connection,
    application_id: i64,
    attempt_number: u32,
    batch_id: &str,
) -> Result<Call> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO calls (application_id, attempt_number, status, external_batch_id, initiated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![application_id, attempt_number, CallStatus::Initiated.as_str(), batch_id, now],
    )?;
    let id = conn.last_insert_rowid();
    get_call(conn, id)?.ok_or(CallError::NotFound(id))
}

const CALL_BASE_SQL: &str = "SELECT id, application_id, attempt_number, status,
            external_conversation_id, external_batch_id, transcript, summary,
            summary_title, recording_url, duration_seconds, initiated_at, ended_at
     FROM calls";

/// Calls still in flight, past the stuck threshold, with a conversation id
/// to poll on (spec §4.2.2 — `reconcile_stuck_calls`'s primary query).
pub fn list_stuck_calls(conn: &Connection, threshold_rfc3339: &str) -> Result<Vec<Call>> {
    let mut stmt = conn.prepare(&format!(
        "{CALL_BASE_SQL} WHERE status IN (?1, ?2) AND initiated_at < ?3
         AND external_conversation_id IS NOT NULL"
    ))?;
    let rows = stmt
        .query_map(
            params![CallStatus::Initiated.as_str(), CallStatus::InProgress.as_str(), threshold_rfc3339],
            row_to_call,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Batch calls that never received a conversation id via webhook, past the
/// orphan threshold (spec §4.2.2's escalation path).
pub fn list_orphaned_batch_calls(conn: &Connection, threshold_rfc3339: &str) -> Result<Vec<Call>> {
    let mut stmt = conn.prepare(&format!(
        "{CALL_BASE_SQL} WHERE status = ?1 AND external_conversation_id IS NULL
         AND external_batch_id IS NOT NULL AND initiated_at < ?2"
    ))?;
    let rows = stmt
        .query_map(params![CallStatus::Initiated.as_str(), threshold_rfc3339], row_to_call)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Late-binding (spec §4.3): under a row lock, find the most recent
/// `INITIATED` Call for `application_id` with no `external_conversation_id`
/// set, and bind it. Returns `None` if no candidate Call exists — the caller
/// must then respond with a "call_not_found" marker, not an error.
pub fn bind_late_conversation_id(
    conn: &mut Connection,
    application_id: i64,
    conversation_id: &str,
) -> Result<Option<Call>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let candidate_id: Option<i64> = tx
        .query_row(
            "SELECT id FROM calls
             WHERE application_id = ?1 AND status = ?2 AND external_conversation_id IS NULL
             ORDER BY initiated_at DESC LIMIT 1",
            params![application_id, CallStatus::Initiated.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(call_id) = candidate_id else {
        tx.commit()?;
        return Ok(None);
    };

    tx.execute(
        "UPDATE calls SET external_conversation_id = ?2 WHERE id = ?1",
        params![call_id, conversation_id],
    )?;
    tx.commit()?;
    get_call(conn, call_id)
}
