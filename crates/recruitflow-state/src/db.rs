use std::str::FromStr;

use rusqlite::{Connection, Result};

use crate::types::{Application, ApplicationStatus, StatusChange};

pub(crate) fn row_to_application(row: &rusqlite::Row<'_>) -> rusqlite::Result<Application> {
    let status = ApplicationStatus::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "status".into(), rusqlite::types::Type::Text))?;
    Ok(Application {
        id: row.get(0)?,
        candidate_id: row.get(1)?,
        position_id: row.get(2)?,
        status,
        qualified: row.get::<_, Option<i64>>(4)?.map(|v| v != 0),
        score: row.get(5)?,
        score_notes: row.get(6)?,
        cv_received_at: row.get(7)?,
        callback_scheduled_at: row.get(8)?,
        needs_human_reason: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) fn row_to_status_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatusChange> {
    let from_status = ApplicationStatus::from_str(&row.get::<_, String>(2)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(2, "from_status".into(), rusqlite::types::Type::Text))?;
    let to_status = ApplicationStatus::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "to_status".into(), rusqlite::types::Type::Text))?;
    Ok(StatusChange {
        id: row.get(0)?,
        application_id: row.get(1)?,
        from_status,
        to_status,
        actor: row.get(4)?,
        note: row.get(5)?,
        changed_at: row.get(6)?,
    })
}

pub fn init_db(conn: &Connection) -> Result<()> {
    create_applications_table(conn)?;
    create_status_changes_table(conn)?;
    Ok(())
}

fn create_applications_table(conn: &Connection) -> Result<()> {
    // (candidate_id, position_id) is unique: one application per pairing.
    // Required indexes per the external-interfaces index list: status,
    // qualified, callback_scheduled_at.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS applications (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            candidate_id            INTEGER NOT NULL,
            position_id             INTEGER NOT NULL,
            status                  TEXT NOT NULL DEFAULT 'PENDING_CALL',
            qualified               INTEGER,
            score                   INTEGER,
            score_notes             TEXT,
            cv_received_at          TEXT,
            callback_scheduled_at   TEXT,
            needs_human_reason      TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            UNIQUE(candidate_id, position_id)
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_applications_status ON applications (status);
        CREATE INDEX IF NOT EXISTS idx_applications_qualified ON applications (qualified);
        CREATE INDEX IF NOT EXISTS idx_applications_callback_scheduled_at
            ON applications (callback_scheduled_at);",
    )
}

fn create_status_changes_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS status_changes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id  INTEGER NOT NULL REFERENCES applications(id),
            from_status     TEXT NOT NULL,
            to_status       TEXT NOT NULL,
            actor           TEXT,
            note            TEXT,
            changed_at      TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_status_changes_application
            ON status_changes (application_id, changed_at);",
    )
}
