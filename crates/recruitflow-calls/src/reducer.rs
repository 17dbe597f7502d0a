use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;

use recruitflow_state::{transition, ApplicationStatus, SidebarCache};

use crate::error::Result;
use crate::types::{Call, CallStatus};

/// Turns matching ElevenLabs's observed field-name variance across API
/// versions (spec §4.3 / SUPPLEMENT — `message`, `content`, `text`).
fn format_transcript(turns: &[Value]) -> String {
    let mut lines = Vec::new();
    for turn in turns {
        let role = turn
            .get("role")
            .and_then(Value::as_str)
            .map(capitalize)
            .unwrap_or_default();
        let text = turn
            .get("message")
            .or_else(|| turn.get("content"))
            .or_else(|| turn.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if !role.is_empty() && !text.is_empty() {
            lines.push(format!("{role}: {text}"));
        }
    }
    lines.join("\n\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The shared "receive call outcome → persist → advance pipeline" function
/// used by both the webhook and the stuck-call reconciler (spec §4.3,
/// glossary — Reducer). `data` is the voice-agent payload's `data` object
/// (or an equivalent poll response). Returns `(new_call_status, is_completed)`.
pub fn apply_call_result(
    conn: &mut Connection,
    cache: &SidebarCache,
    call: &Call,
    data: &Value,
) -> Result<(CallStatus, bool)> {
    let raw_status = data.get("status").and_then(Value::as_str).unwrap_or("");
    let call_status = CallStatus::from_external(raw_status);
    let is_completed = call_status == CallStatus::Completed;

    let transcript = data
        .get("transcript")
        .and_then(Value::as_array)
        .map(|turns| format_transcript(turns))
        .filter(|t| !t.is_empty());

    let analysis = data.get("analysis");
    let summary = analysis
        .and_then(|a| a.get("transcript_summary"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let summary_title = analysis
        .and_then(|a| a.get("call_summary_title"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let recording_url = data.get("recording_url").and_then(Value::as_str).map(str::to_string);

    let metadata = data.get("metadata");
    let duration = metadata
        .and_then(|m| m.get("call_duration_secs"))
        .or_else(|| data.get("duration_seconds"))
        .and_then(Value::as_i64);

    let ended_at = if call_status.is_terminal() {
        Some(Utc::now().to_rfc3339())
    } else {
        None
    };

    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE calls SET
            status = ?2,
            transcript = COALESCE(?3, transcript),
            summary = COALESCE(?4, summary),
            summary_title = COALESCE(?5, summary_title),
            recording_url = COALESCE(?6, recording_url),
            duration_seconds = COALESCE(?7, duration_seconds),
            ended_at = COALESCE(?8, ended_at)
         WHERE id = ?1",
        params![
            call.id,
            call_status.as_str(),
            transcript,
            summary,
            summary_title,
            recording_url,
            duration,
            ended_at,
        ],
    )?;
    tx.commit()?;

    if is_completed {
        transition(
            conn,
            cache,
            call.application_id,
            ApplicationStatus::CallCompleted,
            None,
            None,
        )?;
        transition(conn, cache, call.application_id, ApplicationStatus::Scoring, None, None)?;
    } else if matches!(call_status, CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Busy) {
        transition(conn, cache, call.application_id, ApplicationStatus::CallFailed, None, None)?;
    }

    Ok((call_status, is_completed))
}

/// Escalate an orphaned batch call (spec §4.2.2): no webhook ever arrived,
/// and the orphan threshold has elapsed. Fails both the Call and the
/// Application so the app can be retried.
pub fn escalate_orphan_call(conn: &mut Connection, cache: &SidebarCache, call: &Call) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    tx.execute(
        "UPDATE calls SET status = ?2, ended_at = ?3 WHERE id = ?1",
        params![call.id, CallStatus::Failed.as_str(), now],
    )?;
    tx.commit()?;
    transition(conn, cache, call.application_id, ApplicationStatus::CallFailed, None, Some("orphaned batch call, no webhook received"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruitflow_state::{create_application, db::init_db as init_state_db};
    use serde_json::json;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_state_db(&conn).unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn completed_status_drives_application_to_scoring() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        let call = crate::crud::create_call_with_conversation_id(&conn, app.id, 1, "conv_1").unwrap();

        let payload = json!({
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "Hello, this is a call regarding..."},
                {"role": "user", "text": "Yes, hello..."},
            ],
        });

        let (status, completed) = apply_call_result(&mut conn, &cache, &call, &payload).unwrap();
        assert_eq!(status, CallStatus::Completed);
        assert!(completed);

        let updated = recruitflow_state::get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(updated.status, ApplicationStatus::Scoring);

        let reloaded = crate::crud::get_call(&conn, call.id).unwrap().unwrap();
        assert_eq!(reloaded.transcript.unwrap(), "Agent: Hello, this is a call regarding...\n\nUser: Yes, hello...");
    }

    #[test]
    fn failed_status_drives_application_to_call_failed() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        let call = crate::crud::create_call_with_conversation_id(&conn, app.id, 1, "conv_2").unwrap();

        let (status, completed) =
            apply_call_result(&mut conn, &cache, &call, &json!({"status": "failed"})).unwrap();
        assert_eq!(status, CallStatus::Failed);
        assert!(!completed);

        let updated = recruitflow_state::get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(updated.status, ApplicationStatus::CallFailed);
    }

    #[test]
    fn unknown_status_defaults_to_in_progress() {
        assert_eq!(CallStatus::from_external("ringing"), CallStatus::InProgress);
    }
}
