use std::str::FromStr;

use rusqlite::{Connection, Result};

use crate::types::{CandidateReply, Message, MessageChannel, MessageStatus, MessageTemplate, MessageType};

pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let channel = MessageChannel::from_str(&row.get::<_, String>(2)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(2, "channel".into(), rusqlite::types::Type::Text))?;
    let message_type = MessageType::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "message_type".into(), rusqlite::types::Type::Text))?;
    let status = MessageStatus::from_str(&row.get::<_, String>(4)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(4, "status".into(), rusqlite::types::Type::Text))?;
    Ok(Message {
        id: row.get(0)?,
        application_id: row.get(1)?,
        channel,
        message_type,
        status,
        external_id: row.get(5)?,
        body: row.get(6)?,
        sent_at: row.get(7)?,
        error_detail: row.get(8)?,
    })
}

pub(crate) fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageTemplate> {
    let message_type = MessageType::from_str(&row.get::<_, String>(1)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(1, "message_type".into(), rusqlite::types::Type::Text))?;
    let channel = MessageChannel::from_str(&row.get::<_, String>(2)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(2, "channel".into(), rusqlite::types::Type::Text))?;
    Ok(MessageTemplate {
        id: row.get(0)?,
        message_type,
        channel,
        subject: row.get(3)?,
        body: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
    })
}

pub(crate) fn row_to_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidateReply> {
    let channel = MessageChannel::from_str(&row.get::<_, String>(3)?)
        .map_err(|_| rusqlite::Error::InvalidColumnType(3, "channel".into(), rusqlite::types::Type::Text))?;
    Ok(CandidateReply {
        id: row.get(0)?,
        candidate_id: row.get(1)?,
        application_id: row.get(2)?,
        channel,
        sender: row.get(4)?,
        subject: row.get(5)?,
        body: row.get(6)?,
        received_at: row.get(7)?,
        is_read: row.get::<_, i64>(8)? != 0,
        external_id: row.get(9)?,
    })
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            application_id  INTEGER NOT NULL,
            channel         TEXT NOT NULL,
            message_type    TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'pending',
            external_id     TEXT,
            body            TEXT NOT NULL,
            sent_at         TEXT,
            error_detail    TEXT
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_messages_application_id ON messages (application_id);

         CREATE TABLE IF NOT EXISTS message_templates (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            message_type    TEXT NOT NULL,
            channel         TEXT NOT NULL,
            subject         TEXT NOT NULL DEFAULT '',
            body            TEXT NOT NULL,
            is_active       INTEGER NOT NULL DEFAULT 1,
            UNIQUE (message_type, channel)
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_templates_active ON message_templates (is_active);

         CREATE TABLE IF NOT EXISTS candidate_replies (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            candidate_id    INTEGER,
            application_id  INTEGER,
            channel         TEXT NOT NULL,
            sender          TEXT NOT NULL,
            subject         TEXT,
            body            TEXT NOT NULL,
            received_at     TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            external_id     TEXT
         ) STRICT;
         CREATE INDEX IF NOT EXISTS idx_replies_is_read ON candidate_replies (is_read);
         CREATE INDEX IF NOT EXISTS idx_replies_received_at ON candidate_replies (received_at);",
    )
}
