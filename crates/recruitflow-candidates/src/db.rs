use std::collections::HashMap;
use std::str::FromStr;

use rusqlite::{Connection, Result};

use crate::types::{Candidate, Position, PositionStatus};

/// Map a SELECT row (column order from CANDIDATE_SELECT_SQL) to a Candidate.
pub(crate) fn row_to_candidate(row: &rusqlite::Row<'_>) -> rusqlite::Result<Candidate> {
    let form_answers: HashMap<String, String> =
        serde_json::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    Ok(Candidate {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        whatsapp_number: row.get(6)?,
        lead_source_id: row.get(7)?,
        form_answers,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Map a SELECT row (column order from POSITION_SELECT_SQL) to a Position.
pub(crate) fn row_to_position(row: &rusqlite::Row<'_>) -> rusqlite::Result<Position> {
    let status = PositionStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(PositionStatus::Paused);
    Ok(Position {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status,
        qualification_prompt: row.get(4)?,
        system_prompt: row.get(5)?,
        first_message: row.get(6)?,
        calling_hour_start: row.get(7)?,
        calling_hour_end: row.get(8)?,
        call_retry_max: row.get(9)?,
        call_retry_interval_minutes: row.get(10)?,
        follow_up_interval_hours: row.get(11)?,
        rejected_cv_timeout_days: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Initialise the candidates/positions tables. Safe to call on every
/// startup — CREATE IF NOT EXISTS makes it idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_candidates_table(conn)?;
    create_positions_table(conn)?;
    Ok(())
}

fn create_candidates_table(conn: &Connection) -> Result<()> {
    // lead_source_id is UNIQUE when present so the same inbound lead can't be
    // imported twice; phone/email are indexed since they're the hot lookup
    // path for both webhook ingress and the CV matching cascade.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS candidates (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name        TEXT NOT NULL DEFAULT '',
            last_name         TEXT NOT NULL DEFAULT '',
            full_name         TEXT NOT NULL,
            phone             TEXT,
            email             TEXT,
            whatsapp_number   TEXT,
            lead_source_id    TEXT,
            form_answers      TEXT NOT NULL DEFAULT '{}',
            notes             TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        ) STRICT;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_lead_source_id
            ON candidates (lead_source_id) WHERE lead_source_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_candidates_phone ON candidates (phone);
        CREATE INDEX IF NOT EXISTS idx_candidates_email ON candidates (email);",
    )
}

fn create_positions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS positions (
            id                          INTEGER PRIMARY KEY AUTOINCREMENT,
            title                       TEXT NOT NULL,
            description                 TEXT NOT NULL DEFAULT '',
            status                      TEXT NOT NULL DEFAULT 'open',
            qualification_prompt        TEXT NOT NULL DEFAULT '',
            system_prompt               TEXT NOT NULL DEFAULT '',
            first_message               TEXT NOT NULL DEFAULT '',
            calling_hour_start          INTEGER NOT NULL DEFAULT 9,
            calling_hour_end            INTEGER NOT NULL DEFAULT 18,
            call_retry_max              INTEGER NOT NULL DEFAULT 3,
            call_retry_interval_minutes INTEGER NOT NULL DEFAULT 60,
            follow_up_interval_hours    INTEGER NOT NULL DEFAULT 24,
            rejected_cv_timeout_days    INTEGER NOT NULL DEFAULT 3,
            created_at                  TEXT NOT NULL,
            updated_at                  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_positions_status ON positions (status);",
    )
}
