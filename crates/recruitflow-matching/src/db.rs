use std::str::FromStr;

use rusqlite::{Connection, Result};

use crate::types::{CvMatchMethod, CvSource, CvUpload, InboundChannel, UnmatchedInbound};

pub(crate) fn row_to_cv_upload(row: &rusqlite::Row<'_>) -> rusqlite::Result<CvUpload> {
    let source = CvSource::from_str(&row.get::<_, String>(4)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(4, "source".into(), rusqlite::types::Type::Text))?;
    let match_method = row
        .get::<_, Option<String>>(5)?
        .map(|s| {
            CvMatchMethod::from_str(&s)
                .map_err(|_| rusqlite::Error::InvalidColumnType(5, "match_method".into(), rusqlite::types::Type::Text))
        })
        .transpose()?;
    Ok(CvUpload {
        id: row.get(0)?,
        application_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        source,
        match_method,
        needs_review: row.get::<_, i64>(6)? != 0,
        received_at: row.get(7)?,
    })
}

pub(crate) fn row_to_unmatched(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnmatchedInbound> {
    let channel = InboundChannel::from_str(&row.get::<_, String>(1)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(1, "channel".into(), rusqlite::types::Type::Text))?;
    Ok(UnmatchedInbound {
        id: row.get(0)?,
        channel,
        sender: row.get(2)?,
        subject: row.get(3)?,
        body_snippet: row.get(4)?,
        attachment_name: row.get(5)?,
        raw_payload: row.get(6)?,
        received_at: row.get(7)?,
        resolved: row.get::<_, i64>(8)? != 0,
        resolved_by_application: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cv_uploads (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id  INTEGER NOT NULL,
            file_name       TEXT NOT NULL,
            file_path       TEXT NOT NULL,
            source          TEXT NOT NULL,
            match_method    TEXT,
            needs_review    INTEGER NOT NULL DEFAULT 0,
            received_at     TEXT NOT NULL
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_cv_uploads_needs_review ON cv_uploads (needs_review);
         CREATE INDEX IF NOT EXISTS idx_cv_uploads_application_id ON cv_uploads (application_id);

         CREATE TABLE IF NOT EXISTS unmatched_inbound (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            channel                 TEXT NOT NULL,
            sender                  TEXT NOT NULL,
            subject                 TEXT,
            body_snippet            TEXT,
            attachment_name         TEXT,
            raw_payload             TEXT NOT NULL,
            received_at             TEXT NOT NULL,
            resolved                INTEGER NOT NULL DEFAULT 0,
            resolved_by_application INTEGER,
            resolved_at             TEXT
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_unmatched_resolved ON unmatched_inbound (resolved);",
    )
}
