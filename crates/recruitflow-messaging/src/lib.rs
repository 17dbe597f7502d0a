//! Outbound message delivery (WhatsApp + email) and inbound reply capture.
//! The `Channel` trait abstracts the transport; `service` resolves message
//! bodies (template or hardcoded fallback) and records every send as an
//! audit-trail `Message` row.

pub mod channel;
pub mod crud;
pub mod db;
pub mod error;
pub mod mailbox;
pub mod service;
pub mod types;

pub use channel::{Channel, SendOutcome, StubMailChannel, WhapiChannel};
pub use mailbox::{InboundMail, MailAttachment, Mailbox, StubMailbox};
pub use crud::{
    create_candidate_reply, create_message, get_active_template, list_messages_for_application,
    list_unread_replies, mark_reply_read, most_recent_sent_at,
};
pub use db::init_db;
pub use error::{MessagingError, Result};
pub use service::{save_candidate_reply, send_cv_request, send_followup};
pub use types::{CandidateReply, Message, MessageChannel, MessageStatus, MessageTemplate, MessageType};
