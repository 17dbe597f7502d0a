use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a CV file arrived from (spec §3 — CVUpload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvSource {
    EmailAttachment,
    WhatsappMedia,
    ManualUpload,
}

impl CvSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvSource::EmailAttachment => "email_attachment",
            CvSource::WhatsappMedia => "whatsapp_media",
            CvSource::ManualUpload => "manual_upload",
        }
    }
}

impl std::fmt::Display for CvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CvSource {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "email_attachment" => CvSource::EmailAttachment,
            "whatsapp_media" => CvSource::WhatsappMedia,
            "manual_upload" => CvSource::ManualUpload,
            other => return Err(other.to_string()),
        })
    }
}

/// Which cascade priority (spec §4.4) produced the match, or `Manual` for a
/// recruiter-assigned upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvMatchMethod {
    ExactEmail,
    ExactPhone,
    SubjectId,
    FuzzyName,
    CvContent,
    Manual,
}

impl CvMatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvMatchMethod::ExactEmail => "exact_email",
            CvMatchMethod::ExactPhone => "exact_phone",
            CvMatchMethod::SubjectId => "subject_id",
            CvMatchMethod::FuzzyName => "fuzzy_name",
            CvMatchMethod::CvContent => "cv_content",
            CvMatchMethod::Manual => "manual",
        }
    }

    /// Priorities 1–3 are "high" confidence; 4–5 are "medium" and carry
    /// `needs_review` (spec §4.4's confidence label rule).
    pub fn needs_review(&self) -> bool {
        matches!(self, CvMatchMethod::FuzzyName | CvMatchMethod::CvContent)
    }
}

impl std::fmt::Display for CvMatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CvMatchMethod {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "exact_email" => CvMatchMethod::ExactEmail,
            "exact_phone" => CvMatchMethod::ExactPhone,
            "subject_id" => CvMatchMethod::SubjectId,
            "fuzzy_name" => CvMatchMethod::FuzzyName,
            "cv_content" => CvMatchMethod::CvContent,
            "manual" => CvMatchMethod::Manual,
            other => return Err(other.to_string()),
        })
    }
}

/// A received CV file, possibly one of several rows sharing the same
/// `file_path` when a candidate has multiple open applications (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvUpload {
    pub id: i64,
    pub application_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub source: CvSource,
    pub match_method: Option<CvMatchMethod>,
    pub needs_review: bool,
    pub received_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundChannel {
    Email,
    Whatsapp,
}

impl InboundChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundChannel::Email => "email",
            InboundChannel::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for InboundChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InboundChannel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "email" => InboundChannel::Email,
            "whatsapp" => InboundChannel::Whatsapp,
            other => return Err(other.to_string()),
        })
    }
}

/// An inbound document the cascade could not attribute to any candidate —
/// held for manual recruiter assignment (spec §3 — UnmatchedInbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedInbound {
    pub id: i64,
    pub channel: InboundChannel,
    pub sender: String,
    pub subject: Option<String>,
    pub body_snippet: Option<String>,
    pub attachment_name: Option<String>,
    pub raw_payload: String,
    pub received_at: String,
    pub resolved: bool,
    pub resolved_by_application: Option<i64>,
    pub resolved_at: Option<String>,
}
