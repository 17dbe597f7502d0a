use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use recruitflow_state::{list_awaiting_cv_applications, write_transition, SidebarCache};

use crate::db::{row_to_cv_upload, row_to_unmatched};
use crate::error::{MatchingError, Result};
use crate::types::{CvMatchMethod, CvSource, CvUpload, InboundChannel, UnmatchedInbound};

const CV_UPLOAD_SELECT_SQL_BASE: &str =
    "SELECT id, application_id, file_name, file_path, source, match_method, needs_review, received_at
     FROM cv_uploads";

const UNMATCHED_SELECT_SQL_BASE: &str = "SELECT id, channel, sender, subject, body_snippet,
            attachment_name, raw_payload, received_at, resolved, resolved_by_application, resolved_at
     FROM unmatched_inbound";

pub fn get_cv_upload(conn: &Connection, id: i64) -> Result<Option<CvUpload>> {
    let mut stmt = conn.prepare(&format!("{CV_UPLOAD_SELECT_SQL_BASE} WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], row_to_cv_upload).optional()?)
}

pub fn list_needs_review(conn: &Connection) -> Result<Vec<CvUpload>> {
    let mut stmt =
        conn.prepare(&format!("{CV_UPLOAD_SELECT_SQL_BASE} WHERE needs_review = 1 ORDER BY received_at DESC"))?;
    Ok(stmt.query_map([], row_to_cv_upload)?.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn list_unresolved_inbound(conn: &Connection) -> Result<Vec<UnmatchedInbound>> {
    let mut stmt =
        conn.prepare(&format!("{UNMATCHED_SELECT_SQL_BASE} WHERE resolved = 0 ORDER BY received_at DESC"))?;
    Ok(stmt.query_map([], row_to_unmatched)?.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Attach one CV file to every application of `candidate_id` currently in
/// the awaiting-CV set, transitioning each into its received state inside
/// one atomic unit (spec §4.4's "match outcome"). Returns an empty vec — a
/// signal to the cascade to fall through to the next priority — when the
/// candidate has no awaiting-CV applications, even though it matched.
pub fn attach_cv(
    conn: &mut Connection,
    cache: &SidebarCache,
    candidate_id: i64,
    file_name: &str,
    file_path: &str,
    source: CvSource,
    match_method: CvMatchMethod,
) -> Result<Vec<CvUpload>> {
    let targets = list_awaiting_cv_applications(conn, candidate_id)?;
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let needs_review = match_method.needs_review();
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut uploads = Vec::with_capacity(targets.len());
    for app in &targets {
        tx.execute(
            "INSERT INTO cv_uploads (application_id, file_name, file_path, source, match_method, needs_review, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                app.id,
                file_name,
                file_path,
                source.as_str(),
                match_method.as_str(),
                needs_review as i32,
                now,
            ],
        )?;
        let upload_id = tx.last_insert_rowid();

        tx.execute("UPDATE applications SET cv_received_at = ?2 WHERE id = ?1", params![app.id, now])?;
        let target_status = app
            .status
            .cv_received_target()
            .expect("list_awaiting_cv_applications only returns awaiting-CV applications");
        write_transition(&tx, app.id, target_status, None, None)?;

        let mut stmt = tx.prepare(&format!("{CV_UPLOAD_SELECT_SQL_BASE} WHERE id = ?1"))?;
        uploads.push(stmt.query_row(params![upload_id], row_to_cv_upload)?);
    }
    tx.commit()?;
    cache.invalidate();
    Ok(uploads)
}

pub fn create_unmatched_inbound(
    conn: &Connection,
    channel: InboundChannel,
    sender: &str,
    subject: Option<&str>,
    body_snippet: Option<&str>,
    attachment_name: Option<&str>,
    raw_payload: &str,
) -> Result<UnmatchedInbound> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO unmatched_inbound (channel, sender, subject, body_snippet, attachment_name, raw_payload, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![channel.as_str(), sender, subject, body_snippet, attachment_name, raw_payload, now],
    )?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn.prepare(&format!("{UNMATCHED_SELECT_SQL_BASE} WHERE id = ?1"))?;
    Ok(stmt.query_row(params![id], row_to_unmatched)?)
}

/// Manual recruiter assignment of an unresolved inbound item to an
/// application (spec §12.6's CV Inbox "Assign to Application" action,
/// ported from `original_source/cvs/views.py::AssignUnmatchedView`).
pub fn assign_unmatched(
    conn: &mut Connection,
    cache: &SidebarCache,
    unmatched_id: i64,
    application_id: i64,
) -> Result<CvUpload> {
    let unmatched = {
        let mut stmt = conn.prepare(&format!("{UNMATCHED_SELECT_SQL_BASE} WHERE id = ?1 AND resolved = 0"))?;
        stmt.query_row(params![unmatched_id], row_to_unmatched)
            .optional()?
            .ok_or(MatchingError::UnmatchedNotFound(unmatched_id))?
    };

    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let app = recruitflow_state::get_application(&tx, application_id)?
        .ok_or(MatchingError::ApplicationNotFound(application_id))?;

    tx.execute(
        "INSERT INTO cv_uploads (application_id, file_name, file_path, source, match_method, needs_review, received_at)
         VALUES (?1, ?2, '', ?3, ?4, 0, ?5)",
        params![
            application_id,
            unmatched.attachment_name.as_deref().unwrap_or("unknown"),
            channel_to_source(unmatched.channel).as_str(),
            CvMatchMethod::Manual.as_str(),
            now,
        ],
    )?;
    let upload_id = tx.last_insert_rowid();

    if let Some(target) = app.status.cv_received_target() {
        tx.execute("UPDATE applications SET cv_received_at = ?2 WHERE id = ?1", params![application_id, now])?;
        write_transition(&tx, application_id, target, None, None)?;
    }

    tx.execute(
        "UPDATE unmatched_inbound SET resolved = 1, resolved_by_application = ?2, resolved_at = ?3 WHERE id = ?1",
        params![unmatched_id, application_id, now],
    )?;

    let mut stmt = tx.prepare(&format!("{CV_UPLOAD_SELECT_SQL_BASE} WHERE id = ?1"))?;
    let upload = stmt.query_row(params![upload_id], row_to_cv_upload)?;
    tx.commit()?;
    cache.invalidate();
    Ok(upload)
}

/// Remove the `needs_review` flag on a medium-confidence match the
/// recruiter has confirmed (spec §4.4, CV Inbox "Confirm" action).
pub fn confirm_cv_review(conn: &Connection, cv_upload_id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE cv_uploads SET needs_review = 0 WHERE id = ?1 AND needs_review = 1",
        params![cv_upload_id],
    )?;
    if changed == 0 {
        return Err(MatchingError::CvUploadNotFound(cv_upload_id));
    }
    Ok(())
}

/// Move a CVUpload to a different application (CV Inbox "Reassign" action).
/// Matches `original_source/cvs/views.py::ReassignCVView` — the new
/// application advances; the original is left untouched.
pub fn reassign_cv(
    conn: &mut Connection,
    cache: &SidebarCache,
    cv_upload_id: i64,
    new_application_id: i64,
) -> Result<CvUpload> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let exists: bool = tx
        .query_row("SELECT 1 FROM cv_uploads WHERE id = ?1", params![cv_upload_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Err(MatchingError::CvUploadNotFound(cv_upload_id));
    }
    let app = recruitflow_state::get_application(&tx, new_application_id)?
        .ok_or(MatchingError::ApplicationNotFound(new_application_id))?;

    tx.execute(
        "UPDATE cv_uploads SET application_id = ?2, match_method = ?3, needs_review = 0 WHERE id = ?1",
        params![cv_upload_id, new_application_id, CvMatchMethod::Manual.as_str()],
    )?;

    if let Some(target) = app.status.cv_received_target() {
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE applications SET cv_received_at = ?2 WHERE id = ?1",
            params![new_application_id, now],
        )?;
        write_transition(&tx, new_application_id, target, None, None)?;
    }

    let mut stmt = tx.prepare(&format!("{CV_UPLOAD_SELECT_SQL_BASE} WHERE id = ?1"))?;
    let upload = stmt.query_row(params![cv_upload_id], row_to_cv_upload)?;
    tx.commit()?;
    cache.invalidate();
    Ok(upload)
}

fn channel_to_source(channel: InboundChannel) -> CvSource {
    match channel {
        InboundChannel::Email => CvSource::EmailAttachment,
        InboundChannel::Whatsapp => CvSource::WhatsappMedia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruitflow_state::{create_application, init_db as init_state_db, transition, ApplicationStatus};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_state_db(&conn).unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn attach_cv_fans_out_to_every_awaiting_application() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let a1 = create_application(&conn, 1, 1).unwrap();
        let a2 = create_application(&conn, 1, 2).unwrap();
        transition(&mut conn, &cache, a1.id, ApplicationStatus::AwaitingCv, None, None).unwrap();
        transition(&mut conn, &cache, a2.id, ApplicationStatus::AwaitingCvRejected, None, None).unwrap();

        let uploads = attach_cv(
            &mut conn,
            &cache,
            1,
            "cv.pdf",
            "/tmp/cv.pdf",
            CvSource::EmailAttachment,
            CvMatchMethod::ExactEmail,
        )
        .unwrap();
        assert_eq!(uploads.len(), 2);

        let updated1 = recruitflow_state::get_application(&conn, a1.id).unwrap().unwrap();
        let updated2 = recruitflow_state::get_application(&conn, a2.id).unwrap().unwrap();
        assert_eq!(updated1.status, ApplicationStatus::CvReceived);
        assert_eq!(updated2.status, ApplicationStatus::CvReceivedRejected);
    }

    #[test]
    fn attach_cv_is_a_no_op_fallthrough_when_candidate_has_no_awaiting_applications() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        create_application(&conn, 1, 1).unwrap();
        let uploads = attach_cv(
            &mut conn,
            &cache,
            1,
            "cv.pdf",
            "/tmp/cv.pdf",
            CvSource::EmailAttachment,
            CvMatchMethod::ExactEmail,
        )
        .unwrap();
        assert!(uploads.is_empty());
    }

    #[test]
    fn manual_assignment_resolves_and_advances() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        transition(&mut conn, &cache, app.id, ApplicationStatus::AwaitingCv, None, None).unwrap();
        let unmatched =
            create_unmatched_inbound(&conn, InboundChannel::Email, "mystery@x.com", None, None, Some("cv.pdf"), "{}")
                .unwrap();

        let upload = assign_unmatched(&mut conn, &cache, unmatched.id, app.id).unwrap();
        assert_eq!(upload.match_method, Some(CvMatchMethod::Manual));
        let updated = recruitflow_state::get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(updated.status, ApplicationStatus::CvReceived);
    }
}
