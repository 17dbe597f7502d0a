//! Outbound message orchestration and inbound reply persistence (spec §4.3,
//! §6; ported from `original_source/messaging/services.py`).

use rusqlite::Connection;
use tracing::info;

use recruitflow_candidates::{lookup_candidate_by_email, lookup_candidate_by_phone, Candidate, Position};
use recruitflow_state::{transition, Application, ApplicationStatus, SidebarCache};

use crate::channel::Channel;
use crate::crud::{create_candidate_reply, create_message, get_active_template};
use crate::error::Result;
use crate::types::{render_placeholders, Message, MessageChannel, MessageStatus, MessageType};

fn fallback_body(message_type: MessageType, channel: MessageChannel) -> &'static str {
    use MessageChannel::{Email, Whatsapp};
    use MessageType::*;
    match (message_type, channel) {
        (CvRequest, Whatsapp) => {
            "Hi {first_name},\n\nGreat news! Following your recent call about the {position_title} position, \
             we'd like to move forward.\n\nPlease send us your CV at your earliest convenience.\n\nYour \
             application reference is #{application_pk}.\n\nThank you!"
        }
        (CvRequest, Email) => {
            "Hi {first_name},\n\nGreat news! Following your recent call about the {position_title} position, \
             we'd like to move forward with your application.\n\nCould you please send us your CV/resume at \
             your earliest convenience?\n\nYour application reference is #{application_pk}.\n\nThank \
             you!\nThe {position_title} Recruitment Team"
        }
        (CvRequestRejected, Whatsapp) => {
            "Hi {first_name},\n\nThank you for your interest in the {position_title} position. While this \
             role may not be the best fit right now, we'd love to keep your details on file. Feel free to \
             send us your CV!\n\nBest regards!"
        }
        (CvRequestRejected, Email) => {
            "Hi {first_name},\n\nThank you for your interest in the {position_title} position and for taking \
             the time to speak with us.\n\nWhile this particular role may not be the best fit right now, \
             we'd love to keep your details on file. If you'd like, please send us your CV/resume.\n\nBest \
             regards,\nThe Recruitment Team"
        }
        (CvFollowup1, Whatsapp) => {
            "Hi {first_name}, just a gentle reminder — we're still waiting for your CV for the \
             {position_title} role. Please send it at your earliest convenience."
        }
        (CvFollowup1, Email) => {
            "Hi {first_name},\n\nJust a gentle reminder that we're still waiting for your CV for the \
             {position_title} role.\n\nPlease send it at your earliest convenience.\n\nBest regards,\nThe \
             Recruitment Team"
        }
        (CvFollowup2, Whatsapp) => {
            "Hi {first_name}, this is a final reminder regarding your CV for the {position_title} position. \
             Please send it as soon as possible so we can continue with your application."
        }
        (CvFollowup2, Email) => {
            "Hi {first_name},\n\nThis is a final reminder regarding your CV for the {position_title} \
             position.\n\nPlease send it as soon as possible so we can continue processing your \
             application.\n\nBest regards,\nThe Recruitment Team"
        }
        _ => "",
    }
}

fn fallback_subject(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::CvRequest => "CV Request — {position_title}",
        MessageType::CvRequestRejected => "Thank you — {position_title}",
        MessageType::CvFollowup1 => "Reminder: CV for {position_title}",
        MessageType::CvFollowup2 => "Final Reminder: CV for {position_title}",
        MessageType::Rejection => "Your application — {position_title}",
        MessageType::Other => "",
    }
}

/// (subject, body) for a message_type × channel combination — active
/// template first, then the hardcoded fallback (spec §6).
fn resolve_message(
    conn: &Connection,
    message_type: MessageType,
    channel: MessageChannel,
    first_name: &str,
    position_title: &str,
    application_pk: i64,
) -> Result<(String, String)> {
    if let Some(tpl) = get_active_template(conn, message_type, channel)? {
        return Ok((tpl.render_subject(position_title), tpl.render(first_name, position_title, application_pk)));
    }
    let body = render_placeholders(fallback_body(message_type, channel), first_name, position_title, application_pk);
    let subject =
        render_placeholders(fallback_subject(message_type), first_name, position_title, application_pk);
    Ok((subject, body))
}

async fn send_and_record(
    conn: &Connection,
    transport: &dyn Channel,
    channel: MessageChannel,
    message_type: MessageType,
    application_id: i64,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message> {
    match transport.send(to, Some(subject), body).await {
        Ok(outcome) => create_message(
            conn,
            application_id,
            channel,
            message_type,
            MessageStatus::Sent,
            outcome.external_id.as_deref(),
            body,
            Some(&chrono::Utc::now().to_rfc3339()),
            None,
        ),
        Err(e) => create_message(
            conn,
            application_id,
            channel,
            message_type,
            MessageStatus::Failed,
            None,
            body,
            None,
            Some(&e.to_string()),
        ),
    }
}

/// Send a CV request after evaluation (spec §4.3/§6):
/// qualified → WhatsApp + email, status → `AwaitingCv`;
/// not qualified → WhatsApp only, status → `AwaitingCvRejected`.
pub async fn send_cv_request(
    conn: &mut Connection,
    cache: &SidebarCache,
    whatsapp: &dyn Channel,
    email: &dyn Channel,
    application: &Application,
    candidate: &Candidate,
    position: &Position,
    qualified: bool,
) -> Result<Vec<Message>> {
    let message_type = if qualified { MessageType::CvRequest } else { MessageType::CvRequestRejected };
    let mut created = Vec::new();

    if let Some(phone) = candidate.phone.as_deref() {
        let (_subject, body) = resolve_message(
            conn,
            message_type,
            MessageChannel::Whatsapp,
            &candidate.first_name,
            &position.title,
            application.id,
        )?;
        created.push(
            send_and_record(
                conn,
                whatsapp,
                MessageChannel::Whatsapp,
                message_type,
                application.id,
                phone,
                "",
                &body,
            )
            .await?,
        );
    }

    if qualified {
        if let Some(addr) = candidate.email.as_deref() {
            let (subject, body) = resolve_message(
                conn,
                message_type,
                MessageChannel::Email,
                &candidate.first_name,
                &position.title,
                application.id,
            )?;
            created.push(
                send_and_record(
                    conn,
                    email,
                    MessageChannel::Email,
                    message_type,
                    application.id,
                    addr,
                    &subject,
                    &body,
                )
                .await?,
            );
        }
    }

    let target = if qualified { ApplicationStatus::AwaitingCv } else { ApplicationStatus::AwaitingCvRejected };
    let note = format!("CV request sent (qualified={qualified})");
    transition(conn, cache, application.id, target, None, Some(&note))?;

    info!(application_id = application.id, qualified, messages = created.len(), "CV request sent");
    Ok(created)
}

/// Send a follow-up message to a qualified candidate still awaiting CV
/// (spec §4.2.3/§4.2.4) — WhatsApp and, if on file, email.
pub async fn send_followup(
    conn: &Connection,
    whatsapp: &dyn Channel,
    email: &dyn Channel,
    application: &Application,
    candidate: &Candidate,
    position: &Position,
    message_type: MessageType,
) -> Result<Vec<Message>> {
    let mut created = Vec::new();

    if let Some(phone) = candidate.phone.as_deref() {
        let (_subject, body) = resolve_message(
            conn,
            message_type,
            MessageChannel::Whatsapp,
            &candidate.first_name,
            &position.title,
            application.id,
        )?;
        created.push(
            send_and_record(
                conn,
                whatsapp,
                MessageChannel::Whatsapp,
                message_type,
                application.id,
                phone,
                "",
                &body,
            )
            .await?,
        );
    }

    if let Some(addr) = candidate.email.as_deref() {
        let (subject, body) = resolve_message(
            conn,
            message_type,
            MessageChannel::Email,
            &candidate.first_name,
            &position.title,
            application.id,
        )?;
        created.push(
            send_and_record(
                conn,
                email,
                MessageChannel::Email,
                message_type,
                application.id,
                addr,
                &subject,
                &body,
            )
            .await?,
        );
    }

    info!(application_id = application.id, %message_type, messages = created.len(), "follow-up sent");
    Ok(created)
}

/// Persist an inbound message as a [`crate::types::CandidateReply`],
/// resolving the sender to a candidate and their most recent open
/// application on a best-effort basis (spec §4.3, ported from
/// `save_candidate_reply`).
pub fn save_candidate_reply(
    conn: &Connection,
    channel: MessageChannel,
    sender: &str,
    body: &str,
    subject: Option<&str>,
    external_id: Option<&str>,
) -> Result<()> {
    let candidate = if sender.contains('@') {
        lookup_candidate_by_email(conn, sender)?
    } else {
        lookup_candidate_by_phone(conn, sender)?
    };

    let application_id = match &candidate {
        Some(c) => most_recent_open_application(conn, c.id)?,
        None => None,
    };

    create_candidate_reply(conn, candidate.as_ref().map(|c| c.id), application_id, channel, sender, subject, body, external_id)?;
    info!(%channel, %sender, candidate_id = ?candidate.as_ref().map(|c| c.id), application_id, "candidate reply saved");
    Ok(())
}

fn most_recent_open_application(conn: &Connection, candidate_id: i64) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM applications WHERE candidate_id = ?1 AND status != 'CLOSED' ORDER BY updated_at DESC LIMIT 1",
    )?;
    Ok(stmt.query_row(rusqlite::params![candidate_id], |row| row.get(0)).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitflow_candidates::{create_candidate, create_position, init_db as init_candidates_db};
    use recruitflow_state::{create_application, init_db as init_state_db};

    use crate::channel::SendOutcome;
    use crate::db::init_db as init_messaging_db;
    use crate::error::MessagingError;

    struct StubChannel(bool);

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _to: &str, _subject: Option<&str>, _body: &str) -> Result<SendOutcome> {
            if self.0 {
                Ok(SendOutcome { external_id: Some("ext-1".to_string()) })
            } else {
                Err(MessagingError::SendFailed("boom".to_string()))
            }
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_candidates_db(&conn).unwrap();
        init_state_db(&conn).unwrap();
        init_messaging_db(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn qualified_cv_request_sends_both_channels_and_advances_status() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate = create_candidate(
            &conn,
            "Ana",
            "Reyes",
            Some("+15551112222"),
            Some("ana@x.com"),
            None,
            None,
            Default::default(),
        )
        .unwrap();
        let application = create_application(&conn, candidate.id, position.id).unwrap();

        let wa = StubChannel(true);
        let email = StubChannel(true);
        let messages =
            send_cv_request(&mut conn, &cache, &wa, &email, &application, &candidate, &position, true)
                .await
                .unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.status == MessageStatus::Sent));

        let updated = recruitflow_state::get_application(&conn, application.id).unwrap().unwrap();
        assert_eq!(updated.status, ApplicationStatus::AwaitingCv);
    }

    #[tokio::test]
    async fn rejected_cv_request_sends_whatsapp_only() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate = create_candidate(
            &conn,
            "Ben",
            "Lopez",
            Some("+15550000000"),
            Some("ben@x.com"),
            None,
            None,
            Default::default(),
        )
        .unwrap();
        let application = create_application(&conn, candidate.id, position.id).unwrap();

        let wa = StubChannel(true);
        let email = StubChannel(true);
        let messages =
            send_cv_request(&mut conn, &cache, &wa, &email, &application, &candidate, &position, false)
                .await
                .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, MessageChannel::Whatsapp);

        let updated = recruitflow_state::get_application(&conn, application.id).unwrap().unwrap();
        assert_eq!(updated.status, ApplicationStatus::AwaitingCvRejected);
    }

    #[tokio::test]
    async fn a_failed_send_is_recorded_but_does_not_abort_the_other_channel() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate = create_candidate(
            &conn,
            "Cid",
            "Marlow",
            Some("+15559998888"),
            Some("cid@x.com"),
            None,
            None,
            Default::default(),
        )
        .unwrap();
        let application = create_application(&conn, candidate.id, position.id).unwrap();

        let wa = StubChannel(false);
        let email = StubChannel(true);
        let messages =
            send_cv_request(&mut conn, &cache, &wa, &email, &application, &candidate, &position, true)
                .await
                .unwrap();
        assert_eq!(messages.len(), 2);
        let wa_msg = messages.iter().find(|m| m.channel == MessageChannel::Whatsapp).unwrap();
        assert_eq!(wa_msg.status, MessageStatus::Failed);
        let email_msg = messages.iter().find(|m| m.channel == MessageChannel::Email).unwrap();
        assert_eq!(email_msg.status, MessageStatus::Sent);
    }

    #[test]
    fn save_candidate_reply_resolves_a_known_sender() {
        let conn = test_conn();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate =
            create_candidate(&conn, "Dee", "Knox", None, Some("dee@x.com"), None, None, Default::default())
                .unwrap();
        create_application(&conn, candidate.id, position.id).unwrap();

        save_candidate_reply(&conn, MessageChannel::Email, "dee@x.com", "here is my CV", Some("Re: CV"), None)
            .unwrap();

        let replies = crate::crud::list_unread_replies(&conn).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].candidate_id, Some(candidate.id));
    }

    #[test]
    fn save_candidate_reply_tolerates_an_unknown_sender() {
        let conn = test_conn();
        save_candidate_reply(&conn, MessageChannel::Whatsapp, "+19995551234", "hello?", None, None).unwrap();
        let replies = crate::crud::list_unread_replies(&conn).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].candidate_id, None);
    }
}
