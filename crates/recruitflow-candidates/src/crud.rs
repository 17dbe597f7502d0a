use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;

use recruitflow_core::text;

use crate::db::{row_to_candidate, row_to_position};
use crate::error::{CandidateError, Result};
use crate::types::{Candidate, Position, PositionStatus};

/// Insert a new candidate row. `phone`/`email` are stored as given; callers
/// that need normalized matching should go through `lookup_candidate_by_phone`.
#[allow(clippy::too_many_arguments)]
pub fn create_candidate(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
    email: Option<&str>,
    whatsapp_number: Option<&str>,
    lead_source_id: Option<&str>,
    form_answers: HashMap<String, String>,
) -> Result<Candidate> {
    if phone.is_none() && email.is_none() {
        return Err(CandidateError::Invalid(
            "candidate must have at least one of phone or email".to_string(),
        ));
    }
    let now = Utc::now().to_rfc3339();
    let full_name = format!("{first_name} {last_name}").trim().to_string();
    let form_answers_json = serde_json::to_string(&form_answers)
        .map_err(|e| CandidateError::Invalid(format!("form_answers not serializable: {e}")))?;
    conn.execute(
        "INSERT INTO candidates
            (first_name, last_name, full_name, phone, email, whatsapp_number,
             lead_source_id, form_answers, notes, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,NULL,?9,?9)",
        params![
            first_name,
            last_name,
            full_name,
            phone,
            email,
            whatsapp_number,
            lead_source_id,
            form_answers_json,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_candidate(conn, id)?.ok_or_else(|| CandidateError::NotFound(id.to_string()))
}

pub fn get_candidate(conn: &Connection, id: i64) -> Result<Option<Candidate>> {
    let mut stmt = conn.prepare(CANDIDATE_SELECT_SQL)?;
    match stmt.query_row(params![id], row_to_candidate) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CandidateError::DatabaseError(e)),
    }
}

/// Exact-match lookup by phone number, trying both `phone` and
/// `whatsapp_number` — priority 2 of the CV matching cascade (spec §4.4),
/// and the shared lookup the webhook ingress path uses to resolve a sender.
pub fn lookup_candidate_by_phone(conn: &Connection, raw_phone: &str) -> Result<Option<Candidate>> {
    let digits = text::digits_only(raw_phone);
    if digits.len() < text::MIN_SIGNIFICANT_DIGITS {
        return Ok(None);
    }
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, full_name, phone, email, whatsapp_number,
                lead_source_id, form_answers, notes, created_at, updated_at
         FROM candidates WHERE phone IS NOT NULL OR whatsapp_number IS NOT NULL",
    )?;
    let candidates = stmt
        .query_map([], row_to_candidate)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for candidate in candidates {
        let matches_phone = candidate
            .phone
            .as_deref()
            .map(|p| text::phones_match(&digits, p))
            .unwrap_or(false);
        let matches_whatsapp = candidate
            .whatsapp_number
            .as_deref()
            .map(|p| text::phones_match(&digits, p))
            .unwrap_or(false);
        if matches_phone || matches_whatsapp {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Exact-match lookup by email — priority 1 of the CV matching cascade.
pub fn lookup_candidate_by_email(conn: &Connection, raw_email: &str) -> Result<Option<Candidate>> {
    let email = raw_email.trim().to_lowercase();
    let mut stmt = conn.prepare(&format!("{CANDIDATE_SELECT_SQL_BASE} WHERE lower(email) = ?1"))?;
    match stmt.query_row(params![email], row_to_candidate) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CandidateError::DatabaseError(e)),
    }
}

/// Persist all mutable fields of an existing candidate. Always bumps updated_at.
pub fn update_candidate(conn: &Connection, candidate: &Candidate) -> Result<()> {
    let form_answers_json = serde_json::to_string(&candidate.form_answers)
        .map_err(|e| CandidateError::Invalid(format!("form_answers not serializable: {e}")))?;
    let now = Utc::now().to_rfc3339();
    let updated = conn.execute(
        "UPDATE candidates SET
            first_name=?2, last_name=?3, full_name=?4, phone=?5, email=?6,
            whatsapp_number=?7, lead_source_id=?8, form_answers=?9, notes=?10, updated_at=?11
         WHERE id=?1",
        params![
            candidate.id,
            candidate.first_name,
            candidate.last_name,
            candidate.full_name,
            candidate.phone,
            candidate.email,
            candidate.whatsapp_number,
            candidate.lead_source_id,
            form_answers_json,
            candidate.notes,
            now,
        ],
    )?;
    if updated == 0 {
        return Err(CandidateError::NotFound(candidate.id.to_string()));
    }
    Ok(())
}

/// Create a new open position. Voice-agent prompts and calling-hour window
/// default to broad values the operator is expected to tune immediately.
pub fn create_position(conn: &Connection, title: &str, description: &str) -> Result<Position> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO positions
            (title, description, status, qualification_prompt, system_prompt, first_message,
             created_at, updated_at)
         VALUES (?1,?2,'open','','','',?3,?3)",
        params![title, description, now],
    )?;
    let id = conn.last_insert_rowid();
    get_position(conn, id)?.ok_or_else(|| CandidateError::PositionNotFound(id))
}

pub fn get_position(conn: &Connection, id: i64) -> Result<Option<Position>> {
    let mut stmt = conn.prepare(POSITION_SELECT_SQL)?;
    match stmt.query_row(params![id], row_to_position) {
        Ok(p) => Ok(Some(p)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CandidateError::DatabaseError(e)),
    }
}

pub fn list_open_positions(conn: &Connection) -> Result<Vec<Position>> {
    let mut stmt = conn.prepare(&format!("{POSITION_SELECT_SQL_BASE} WHERE status = 'open'"))?;
    let rows = stmt
        .query_map([], row_to_position)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_position_status(conn: &Connection, id: i64, status: PositionStatus) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let updated = conn.execute(
        "UPDATE positions SET status=?2, updated_at=?3 WHERE id=?1",
        params![id, status.to_string(), now],
    )?;
    if updated == 0 {
        return Err(CandidateError::PositionNotFound(id));
    }
    Ok(())
}

// ── private helpers ─────────────────────────────────────────────────────────

const CANDIDATE_SELECT_SQL_BASE: &str =
    "SELECT id, first_name, last_name, full_name, phone, email, whatsapp_number,
            lead_source_id, form_answers, notes, created_at, updated_at
     FROM candidates";

const CANDIDATE_SELECT_SQL: &str = "SELECT id, first_name, last_name, full_name, phone, email, whatsapp_number,
            lead_source_id, form_answers, notes, created_at, updated_at
     FROM candidates WHERE id = ?1";

const POSITION_SELECT_SQL_BASE: &str =
    "SELECT id, title, description, status, qualification_prompt, system_prompt, first_message,
            calling_hour_start, calling_hour_end, call_retry_max, call_retry_interval_minutes,
            follow_up_interval_hours, rejected_cv_timeout_days, created_at, updated_at
     FROM positions";

const POSITION_SELECT_SQL: &str = "SELECT id, title, description, status, qualification_prompt, system_prompt, first_message,
            calling_hour_start, calling_hour_end, call_retry_max, call_retry_interval_minutes,
            follow_up_interval_hours, rejected_cv_timeout_days, created_at, updated_at
     FROM positions WHERE id = ?1";

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
    fn creating_candidate_without_phone_or_email_is_rejected() {
        let conn = test_conn();
        let err = create_candidate(&conn, "Ana", "Silva", None, None, None, None, HashMap::new())
            .unwrap_err();
        assert!(matches!(err, CandidateError::Invalid(_)));
    }

    #[test]
    fn phone_lookup_matches_by_suffix() {
        let conn = test_conn();
        create_candidate(
            &conn,
            "Ana",
            "Silva",
            Some("+55 11 98888-7777"),
            None,
            None,
            None,
            HashMap::new(),
        )
        .unwrap();
        let found = lookup_candidate_by_phone(&conn, "5511988887777").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().first_name, "Ana");
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let conn = test_conn();
        create_candidate(
            &conn,
            "Ana",
            "Silva",
            None,
            Some("Ana.Silva@example.com"),
            None,
            None,
            HashMap::new(),
        )
        .unwrap();
        let found = lookup_candidate_by_email(&conn, "ana.silva@EXAMPLE.com").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn create_position_defaults_to_open() {
        let conn = test_conn();
        let position = create_position(&conn, "Backend Engineer", "Build things").unwrap();
        assert_eq!(position.status, PositionStatus::Open);
        assert!(position.is_open());
    }

    #[test]
    fn set_position_status_updates_row() {
        let conn = test_conn();
        let position = create_position(&conn, "Backend Engineer", "Build things").unwrap();
        set_position_status(&conn, position.id, PositionStatus::Paused).unwrap();
        let reloaded = get_position(&conn, position.id).unwrap().unwrap();
        assert_eq!(reloaded.status, PositionStatus::Paused);
    }
}
