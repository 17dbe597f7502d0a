//! Inbound mailbox polling (spec §4.2.5, ported from
//! `original_source/messaging/services.py::GmailService`'s
//! `list_unread_with_attachments`/`move_to_label`).
//!
//! Mirrors [`crate::channel::StubMailChannel`]'s stance on OAuth mail
//! delivery: concrete Gmail wiring is out of scope, so [`StubMailbox`]
//! always reports an empty inbox rather than fabricating a provider.

use async_trait::async_trait;
use tracing::warn;

use crate::error::MessagingError;

/// One file attached to an inbound message (spec §3 — the matching
/// cascade's input for email-sourced CVs).
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// An unread message fetched from the mailbox, with its attachments already
/// downloaded.
#[derive(Debug, Clone)]
pub struct InboundMail {
    pub external_id: String,
    pub sender: String,
    pub subject: String,
    pub body_snippet: String,
    pub attachments: Vec<MailAttachment>,
}

/// Abstraction over the mailbox provider `poll_cv_mailbox` drains (spec
/// §4.2.5). Scoped to a named label when the provider supports one.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn list_unread(&self, label: Option<&str>) -> Result<Vec<InboundMail>, MessagingError>;

    /// Mark a message processed — moved to a "processed" label, or simply
    /// flagged read, depending on the provider.
    async fn mark_processed(&self, external_id: &str) -> Result<(), MessagingError>;
}

pub struct StubMailbox;

#[async_trait]
impl Mailbox for StubMailbox {
    async fn list_unread(&self, _label: Option<&str>) -> Result<Vec<InboundMail>, MessagingError> {
        warn!("mailbox transport not configured — reporting an empty inbox");
        Ok(Vec::new())
    }

    async fn mark_processed(&self, _external_id: &str) -> Result<(), MessagingError> {
        Ok(())
    }
}
