//! `poll_cv_mailbox` (spec §4.2.5, every 15 minutes): drains the unread
//! inbox, runs every attachment through the CV matching cascade, and
//! records any bare-text reply as a candidate reply. Gated by
//! `mail.enabled` — the engine simply doesn't spawn this loop when unset.

use rusqlite::Connection;
use tracing::warn;

use recruitflow_eval::LlmProvider;
use recruitflow_matching::{extract_text, match_inbound, store_cv_file, InboundChannel, InboundCv};
use recruitflow_messaging::{save_candidate_reply, Mailbox, MessageChannel};
use recruitflow_state::SidebarCache;

use crate::error::Result;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    conn: &mut Connection,
    cache: &SidebarCache,
    mailbox: &dyn Mailbox,
    provider: Option<&dyn LlmProvider>,
    extraction_model: &str,
    inbox_label: Option<&str>,
    cv_dir: &str,
) -> Result<()> {
    let messages = mailbox.list_unread(inbox_label).await?;

    for message in messages {
        for attachment in &message.attachments {
            let content_text = extract_text(&attachment.file_name, &attachment.content);
            let stored_path = match store_cv_file(cv_dir, &attachment.file_name, &attachment.content).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(
                        external_id = %message.external_id,
                        attachment = %attachment.file_name,
                        error = %e,
                        "failed to persist mailbox attachment to disk"
                    );
                    continue;
                }
            };
            let input = InboundCv {
                channel: InboundChannel::Email,
                sender: message.sender.clone(),
                file_name: attachment.file_name.clone(),
                file_path: stored_path,
                subject_or_body: Some(message.subject.as_str()),
                content_text: content_text.as_deref(),
            };
            if let Err(e) = match_inbound(conn, cache, provider, extraction_model, input).await {
                warn!(
                    external_id = %message.external_id,
                    attachment = %attachment.file_name,
                    error = %e,
                    "CV matching cascade failed for mailbox attachment"
                );
            }
        }

        if !message.body_snippet.trim().is_empty() {
            if let Err(e) = save_candidate_reply(
                conn,
                MessageChannel::Email,
                &message.sender,
                &message.body_snippet,
                Some(message.subject.as_str()),
                Some(message.external_id.as_str()),
            ) {
                warn!(external_id = %message.external_id, error = %e, "failed to save mailbox reply");
            }
        }

        if let Err(e) = mailbox.mark_processed(&message.external_id).await {
            warn!(external_id = %message.external_id, error = %e, "failed to mark mailbox message processed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitflow_candidates::{create_candidate, create_position, init_db as init_candidates_db};
    use recruitflow_matching::{init_db as init_matching_db, list_unresolved_inbound};
    use recruitflow_messaging::{init_db as init_messaging_db, list_unread_replies, MailAttachment, MessagingError};
    use recruitflow_state::{create_application, get_application, init_db as init_state_db, ApplicationStatus};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubMailbox {
        messages: Mutex<Vec<recruitflow_messaging::InboundMail>>,
    }

    #[async_trait]
    impl Mailbox for StubMailbox {
        async fn list_unread(&self, _label: Option<&str>) -> std::result::Result<Vec<recruitflow_messaging::InboundMail>, MessagingError> {
            Ok(std::mem::take(&mut *self.messages.lock().unwrap()))
        }
        async fn mark_processed(&self, _external_id: &str) -> std::result::Result<(), MessagingError> {
            Ok(())
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_candidates_db(&conn).unwrap();
        init_state_db(&conn).unwrap();
        init_matching_db(&conn).unwrap();
        init_messaging_db(&conn).unwrap();
        conn
    }

    fn test_cv_dir(label: &str) -> String {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("recruitflow-mailbox-test-{label}-{n}")).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn empty_inbox_is_a_no_op() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let mailbox = StubMailbox { messages: Mutex::new(Vec::new()) };

        run(&mut conn, &cache, &mailbox, None, "test-model", None, &test_cv_dir("empty")).await.unwrap();
    }

    #[tokio::test]
    async fn attachment_from_known_candidate_attaches_cv_and_advances_status() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let candidate =
            create_candidate(&conn, "Ana", "Silva", Some("+5511988887777"), Some("ana@x.com"), None, None, HashMap::new()).unwrap();
        let position = create_position(&conn, "Driver", "").unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        conn.execute("UPDATE applications SET status = 'AWAITING_CV' WHERE id = ?1", [app.id]).unwrap();

        let mailbox = StubMailbox {
            messages: Mutex::new(vec![recruitflow_messaging::InboundMail {
                external_id: "msg-1".into(),
                sender: "ana@x.com".into(),
                subject: "My CV".into(),
                body_snippet: String::new(),
                attachments: vec![MailAttachment { file_name: "cv.pdf".into(), content: vec![] }],
            }]),
        };

        run(&mut conn, &cache, &mailbox, None, "test-model", None, &test_cv_dir("known")).await.unwrap();

        let reloaded = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ApplicationStatus::CvReceived);
    }

    #[tokio::test]
    async fn attachment_from_unknown_sender_is_filed_as_unmatched() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let mailbox = StubMailbox {
            messages: Mutex::new(vec![recruitflow_messaging::InboundMail {
                external_id: "msg-2".into(),
                sender: "stranger@nowhere.com".into(),
                subject: "CV attached".into(),
                body_snippet: String::new(),
                attachments: vec![MailAttachment { file_name: "cv.pdf".into(), content: vec![] }],
            }]),
        };

        run(&mut conn, &cache, &mailbox, None, "test-model", None, &test_cv_dir("unknown")).await.unwrap();

        assert_eq!(list_unresolved_inbound(&conn).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bare_text_reply_is_saved_as_a_candidate_reply() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let mailbox = StubMailbox {
            messages: Mutex::new(vec![recruitflow_messaging::InboundMail {
                external_id: "msg-3".into(),
                sender: "someone@example.com".into(),
                subject: "Re: application".into(),
                body_snippet: "Sorry, I found another job.".into(),
                attachments: vec![],
            }]),
        };

        run(&mut conn, &cache, &mailbox, None, "test-model", None, &test_cv_dir("reply")).await.unwrap();

        let replies = list_unread_replies(&conn).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body, "Sorry, I found another job.");
    }
}
