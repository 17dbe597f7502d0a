use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{row_to_message, row_to_reply, row_to_template};
use crate::error::Result;
use crate::types::{CandidateReply, Message, MessageChannel, MessageStatus, MessageTemplate, MessageType};

const MESSAGE_SELECT_SQL_BASE: &str =
    "SELECT id, application_id, channel, message_type, status, external_id, body, sent_at, error_detail
     FROM messages";

const TEMPLATE_SELECT_SQL_BASE: &str = "SELECT id, message_type, channel, subject, body, is_active
     FROM message_templates";

const REPLY_SELECT_SQL_BASE: &str = "SELECT id, candidate_id, application_id, channel, sender, subject,
            body, received_at, is_read, external_id
     FROM candidate_replies";

#[allow(clippy::too_many_arguments)]
pub fn create_message(
    conn: &Connection,
    application_id: i64,
    channel: MessageChannel,
    message_type: MessageType,
    status: MessageStatus,
    external_id: Option<&str>,
    body: &str,
    sent_at: Option<&str>,
    error_detail: Option<&str>,
) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages (application_id, channel, message_type, status, external_id, body, sent_at, error_detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            application_id,
            channel.as_str(),
            message_type.as_str(),
            status.as_str(),
            external_id,
            body,
            sent_at,
            error_detail,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn.prepare(&format!("{MESSAGE_SELECT_SQL_BASE} WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], row_to_message)?)
}

pub fn list_messages_for_application(conn: &Connection, application_id: i64) -> Result<Vec<Message>> {
    let mut stmt =
        conn.prepare(&format!("{MESSAGE_SELECT_SQL_BASE} WHERE application_id = ?1 ORDER BY id DESC"))?;
    Ok(stmt.query_map(params![application_id], row_to_message)?.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// `sent_at` of the most recent successfully sent outbound message for the
/// application — the primary baseline for `advance_cv_followups` (spec
/// §4.2.3), before falling back to the status-change timeline.
pub fn most_recent_sent_at(conn: &Connection, application_id: i64) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT sent_at FROM messages
         WHERE application_id = ?1 AND status = ?2 AND sent_at IS NOT NULL
         ORDER BY sent_at DESC, id DESC LIMIT 1",
    )?;
    let sent_at = stmt
        .query_row(params![application_id, MessageStatus::Sent.as_str()], |row| row.get(0))
        .optional()?;
    Ok(sent_at)
}

/// The active, recruiter-customised override for a (message_type, channel)
/// pair, if one exists (spec §6 — template-first resolution).
pub fn get_active_template(
    conn: &Connection,
    message_type: MessageType,
    channel: MessageChannel,
) -> Result<Option<MessageTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "{TEMPLATE_SELECT_SQL_BASE} WHERE message_type = ?1 AND channel = ?2 AND is_active = 1"
    ))?;
    Ok(stmt.query_row(params![message_type.as_str(), channel.as_str()], row_to_template).optional()?)
}

pub fn create_candidate_reply(
    conn: &Connection,
    candidate_id: Option<i64>,
    application_id: Option<i64>,
    channel: MessageChannel,
    sender: &str,
    subject: Option<&str>,
    body: &str,
    external_id: Option<&str>,
) -> Result<CandidateReply> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO candidate_replies (candidate_id, application_id, channel, sender, subject, body, received_at, is_read, external_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
        params![candidate_id, application_id, channel.as_str(), sender, subject, body, now, external_id],
    )?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn.prepare(&format!("{REPLY_SELECT_SQL_BASE} WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], row_to_reply)?)
}

pub fn list_unread_replies(conn: &Connection) -> Result<Vec<CandidateReply>> {
    let mut stmt =
        conn.prepare(&format!("{REPLY_SELECT_SQL_BASE} WHERE is_read = 0 ORDER BY received_at DESC"))?;
    Ok(stmt.query_map([], row_to_reply)?.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn mark_reply_read(conn: &Connection, reply_id: i64) -> Result<()> {
    conn.execute("UPDATE candidate_replies SET is_read = 1 WHERE id = ?1", params![reply_id])?;
    Ok(())
}
