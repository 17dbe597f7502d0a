use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What an outbound message is for (spec §3 — Message/MessageTemplate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    CvRequest,
    CvRequestRejected,
    CvFollowup1,
    CvFollowup2,
    Rejection,
    Other,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CvRequest => "cv_request",
            MessageType::CvRequestRejected => "cv_request_rejected",
            MessageType::CvFollowup1 => "cv_followup_1",
            MessageType::CvFollowup2 => "cv_followup_2",
            MessageType::Rejection => "rejection",
            MessageType::Other => "other",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "cv_request" => MessageType::CvRequest,
            "cv_request_rejected" => MessageType::CvRequestRejected,
            "cv_followup_1" => MessageType::CvFollowup1,
            "cv_followup_2" => MessageType::CvFollowup2,
            "rejection" => MessageType::Rejection,
            "other" => MessageType::Other,
            other => return Err(other.to_string()),
        })
    }
}

/// The delivery channel for an outbound [`Message`] or inbound
/// [`CandidateReply`] (spec §3). Distinct from the [`crate::channel::Channel`]
/// trait, which is the transport abstraction these values select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageChannel {
    Email,
    Whatsapp,
}

impl MessageChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageChannel::Email => "email",
            MessageChannel::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for MessageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageChannel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "email" => MessageChannel::Email,
            "whatsapp" => MessageChannel::Whatsapp,
            other => return Err(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "pending" => MessageStatus::Pending,
            "sent" => MessageStatus::Sent,
            "delivered" => MessageStatus::Delivered,
            "failed" => MessageStatus::Failed,
            other => return Err(other.to_string()),
        })
    }
}

/// An audit record of one outbound communication (spec §3 — Message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub application_id: i64,
    pub channel: MessageChannel,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub body: String,
    pub sent_at: Option<String>,
    pub error_detail: Option<String>,
}

/// A recruiter-editable body override for one (message_type, channel) pair
/// (spec §3 — MessageTemplate, §6's placeholder rules).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: i64,
    pub message_type: MessageType,
    pub channel: MessageChannel,
    pub subject: String,
    pub body: String,
    pub is_active: bool,
}

impl MessageTemplate {
    /// Substitute `{first_name}`, `{position_title}`, `{application_pk}` in
    /// the body (spec §6 — identical placeholder set to the fallback
    /// bodies).
    pub fn render(&self, first_name: &str, position_title: &str, application_pk: i64) -> String {
        render_placeholders(&self.body, first_name, position_title, application_pk)
    }

    pub fn render_subject(&self, position_title: &str) -> String {
        self.subject.replace("{position_title}", position_title)
    }
}

pub(crate) fn render_placeholders(template: &str, first_name: &str, position_title: &str, application_pk: i64) -> String {
    template
        .replace("{first_name}", first_name)
        .replace("{position_title}", position_title)
        .replace("{application_pk}", &application_pk.to_string())
}

/// An inbound message from a candidate (spec §3 — CandidateReply). Both FKs
/// are optional — an unresolved sender still produces a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReply {
    pub id: i64,
    pub candidate_id: Option<i64>,
    pub application_id: Option<i64>,
    pub channel: MessageChannel,
    pub sender: String,
    pub subject: Option<String>,
    pub body: String,
    pub received_at: String,
    pub is_read: bool,
    pub external_id: Option<String>,
}
