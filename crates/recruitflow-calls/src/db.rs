use std::str::FromStr;

use rusqlite::{Connection, Result};

use crate::types::{Call, CallStatus};

pub(crate) fn row_to_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<Call> {
    let status = CallStatus::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "status".into(), rusqlite::types::Type::Text))?;
    Ok(Call {
        id: row.get(0)?,
        application_id: row.get(1)?,
        attempt_number: row.get(2)?,
        status,
        external_conversation_id: row.get(4)?,
        external_batch_id: row.get(5)?,
        transcript: row.get(6)?,
        summary: row.get(7)?,
        summary_title: row.get(8)?,
        recording_url: row.get(9)?,
        duration_seconds: row.get(10)?,
        initiated_at: row.get(11)?,
        ended_at: row.get(12)?,
    })
}

pub fn init_db(conn: &Connection) -> Result<()> {
    // external_conversation_id is unique when non-null — the hot lookup key
    // for the webhook path, and the invariant §8's "unique conversation id"
    // property depends on.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS calls (
            id                          INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id              INTEGER NOT NULL,
            attempt_number              INTEGER NOT NULL,
            status                      TEXT NOT NULL DEFAULT 'INITIATED',
            external_conversation_id    TEXT,
            external_batch_id           TEXT,
            transcript                  TEXT,
            summary                     TEXT,
            summary_title               TEXT,
            recording_url               TEXT,
            duration_seconds            INTEGER,
            initiated_at                TEXT NOT NULL,
            ended_at                    TEXT
        ) STRICT;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_calls_external_conversation_id
            ON calls (external_conversation_id) WHERE external_conversation_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_calls_application ON calls (application_id);
        CREATE INDEX IF NOT EXISTS idx_calls_status_initiated_at ON calls (status, initiated_at);",
    )
}
