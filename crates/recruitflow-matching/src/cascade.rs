//! The inbound CV matching cascade (spec §4.4): tries six priorities in
//! order and attaches the file to every awaiting-CV application of the
//! matched candidate, or files it as [`UnmatchedInbound`] when nothing
//! resolves it.

use rusqlite::Connection;

use recruitflow_candidates::{lookup_candidate_by_email, lookup_candidate_by_phone};
use recruitflow_core::text::{bare_email, display_name, extract_reference_id};
use recruitflow_eval::LlmProvider;
use recruitflow_state::{candidate_ids_awaiting_cv, get_application, SidebarCache};

use crate::crud::{attach_cv, create_unmatched_inbound};
use crate::extraction::extract_contact;
use crate::types::{CvMatchMethod, CvSource, CvUpload, InboundChannel};
use crate::Result;

/// Minimum `strsim::jaro_winkler` ratio to accept a fuzzy name match (spec
/// §4.4 priority 4). `strsim` is used here as the closest crate-based
/// analogue of Python's `difflib.SequenceMatcher().ratio()` threshold of
/// 0.80 — the two algorithms are not identical, but agree closely on the
/// short human-name strings this cascade compares.
const FUZZY_NAME_THRESHOLD: f64 = 0.80;

pub struct InboundCv<'a> {
    pub channel: InboundChannel,
    pub sender: String,
    pub file_name: String,
    pub file_path: String,
    /// Email subject line or WhatsApp caption, if any — searched for a
    /// reference id (priority 3) and a display name (priority 4).
    pub subject_or_body: Option<&'a str>,
    /// Extracted CV text, used only for the priority-5 LLM fallback.
    pub content_text: Option<&'a str>,
}

#[derive(Debug)]
pub enum MatchResult {
    Matched { uploads: Vec<CvUpload>, method: CvMatchMethod },
    Unmatched(crate::types::UnmatchedInbound),
}

pub async fn match_inbound(
    conn: &mut Connection,
    cache: &SidebarCache,
    provider: Option<&dyn LlmProvider>,
    model: &str,
    input: InboundCv<'_>,
) -> Result<MatchResult> {
    if let Some(email) = bare_email(&input.sender) {
        if let Some(candidate) = lookup_candidate_by_email(conn, &email)? {
            if let Some(result) = try_attach(conn, cache, candidate.id, &input, CvMatchMethod::ExactEmail)? {
                return Ok(result);
            }
        }
    }

    if let Some(candidate) = lookup_candidate_by_phone(conn, &input.sender)? {
        if let Some(result) = try_attach(conn, cache, candidate.id, &input, CvMatchMethod::ExactPhone)? {
            return Ok(result);
        }
    }

    if let Some(subject) = input.subject_or_body {
        if let Some(reference_id) = extract_reference_id(subject) {
            if let Some(app) = get_application(conn, reference_id)? {
                if let Some(result) =
                    try_attach(conn, cache, app.candidate_id, &input, CvMatchMethod::SubjectId)?
                {
                    return Ok(result);
                }
            }
        }
    }

    if let Some(name) = input
        .subject_or_body
        .and_then(display_name)
        .or_else(|| display_name(&input.sender))
        .filter(|n| n.chars().count() >= 3)
    {
        if let Some(candidate_id) = fuzzy_match_name(conn, &name)? {
            if let Some(result) = try_attach(conn, cache, candidate_id, &input, CvMatchMethod::FuzzyName)? {
                return Ok(result);
            }
        }
    }

    if let (Some(provider), Some(text)) = (provider, input.content_text) {
        let contact = extract_contact(provider, model, text).await?;
        if let Some(email) = contact.email.as_deref() {
            if let Some(candidate) = lookup_candidate_by_email(conn, email)? {
                if let Some(result) = try_attach(conn, cache, candidate.id, &input, CvMatchMethod::CvContent)? {
                    return Ok(result);
                }
            }
        }
        if let Some(phone) = contact.phone.as_deref() {
            if let Some(candidate) = lookup_candidate_by_phone(conn, phone)? {
                if let Some(result) = try_attach(conn, cache, candidate.id, &input, CvMatchMethod::CvContent)? {
                    return Ok(result);
                }
            }
        }
        let full_name = [&contact.first_name, &contact.last_name]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.trim().is_empty() {
            if let Some(candidate_id) = fuzzy_match_name(conn, &full_name)? {
                if let Some(result) = try_attach(conn, cache, candidate_id, &input, CvMatchMethod::CvContent)? {
                    return Ok(result);
                }
            }
        }
    }

    let unmatched = create_unmatched_inbound(
        conn,
        input.channel,
        &input.sender,
        input.subject_or_body,
        input.content_text.map(|t| t.chars().take(500).collect::<String>()).as_deref(),
        Some(&input.file_name),
        input.subject_or_body.unwrap_or_default(),
    )?;
    Ok(MatchResult::Unmatched(unmatched))
}

fn try_attach(
    conn: &mut Connection,
    cache: &SidebarCache,
    candidate_id: i64,
    input: &InboundCv<'_>,
    method: CvMatchMethod,
) -> Result<Option<MatchResult>> {
    let source = match input.channel {
        InboundChannel::Email => CvSource::EmailAttachment,
        InboundChannel::Whatsapp => CvSource::WhatsappMedia,
    };
    let uploads = attach_cv(conn, cache, candidate_id, &input.file_name, &input.file_path, source, method)?;
    if uploads.is_empty() {
        return Ok(None);
    }
    Ok(Some(MatchResult::Matched { uploads, method }))
}

fn fuzzy_match_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let pool = candidate_ids_awaiting_cv(conn)?;
    let mut best: Option<(i64, f64)> = None;
    for candidate_id in pool {
        let Some(candidate) = recruitflow_candidates::get_candidate(conn, candidate_id)? else { continue };
        let ratio = strsim::jaro_winkler(&name.to_lowercase(), &candidate.full_name.to_lowercase());
        if ratio > FUZZY_NAME_THRESHOLD && best.map(|(_, b)| ratio > b).unwrap_or(true) {
            best = Some((candidate_id, ratio));
        }
    }
    Ok(best.map(|(id, _)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruitflow_candidates::{create_candidate, create_position, init_db as init_candidates_db};
    use recruitflow_state::{create_application, init_db as init_state_db, ApplicationStatus};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_candidates_db(&conn).unwrap();
        init_state_db(&conn).unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn matches_by_exact_email_and_advances_application() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate =
            create_candidate(
                &conn,
                "Ana",
                "Reyes",
                Some("+1 555 111 2222"),
                Some("ana@x.com"),
                None,
                None,
                Default::default(),
            )
            .unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        recruitflow_state::transition(&mut conn, &cache, app.id, ApplicationStatus::AwaitingCv, None, None).unwrap();

        let input = InboundCv {
            channel: InboundChannel::Email,
            sender: "Ana Reyes <ana@x.com>".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: None,
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        match result {
            MatchResult::Matched { uploads, method } => {
                assert_eq!(uploads.len(), 1);
                assert_eq!(method, CvMatchMethod::ExactEmail);
            }
            MatchResult::Unmatched(_) => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_unmatched_inbound_when_nothing_resolves() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let input = InboundCv {
            channel: InboundChannel::Whatsapp,
            sender: "+1 555 000 0000".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: None,
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        assert!(matches!(result, MatchResult::Unmatched(_)));
    }

    #[tokio::test]
    async fn falls_through_when_matched_candidate_has_no_awaiting_application() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate =
            create_candidate(&conn, "Ben", "Lopez", None, Some("ben@x.com"), None, None, Default::default())
                .unwrap();
        // No transition to AwaitingCv — application stays PENDING_CALL, so
        // the exact-email match has no target and the cascade must fall
        // through all the way to UnmatchedInbound.
        create_application(&conn, candidate.id, position.id).unwrap();

        let input = InboundCv {
            channel: InboundChannel::Email,
            sender: "ben@x.com".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: None,
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        assert!(matches!(result, MatchResult::Unmatched(_)));
    }

    #[tokio::test]
    async fn fuzzy_name_matches_a_close_but_not_exact_spelling() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate =
            create_candidate(&conn, "Caroline", "Nunes", None, None, None, None, Default::default()).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        recruitflow_state::transition(&mut conn, &cache, app.id, ApplicationStatus::AwaitingCv, None, None).unwrap();

        let input = InboundCv {
            channel: InboundChannel::Whatsapp,
            sender: "+1 555 333 4444".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: Some("Carolina Nunes <carolina@example.com>"),
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        match result {
            MatchResult::Matched { method, .. } => assert_eq!(method, CvMatchMethod::FuzzyName),
            MatchResult::Unmatched(_) => panic!("expected a fuzzy-name match"),
        }
    }

    #[tokio::test]
    async fn display_name_shorter_than_three_chars_never_reaches_fuzzy_matching() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate = create_candidate(&conn, "Al", "Smith", None, None, None, None, Default::default()).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        recruitflow_state::transition(&mut conn, &cache, app.id, ApplicationStatus::AwaitingCv, None, None).unwrap();

        let input = InboundCv {
            channel: InboundChannel::Whatsapp,
            sender: "+1 555 555 6666".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: Some("Al <al@example.com>"),
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        assert!(matches!(result, MatchResult::Unmatched(_)));
    }

    #[tokio::test]
    async fn dissimilar_name_below_threshold_is_filed_as_unmatched() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let position = create_position(&conn, "Driver", "desc").unwrap();
        let candidate = create_candidate(&conn, "Ana", "Reyes", None, None, None, None, Default::default()).unwrap();
        let app = create_application(&conn, candidate.id, position.id).unwrap();
        recruitflow_state::transition(&mut conn, &cache, app.id, ApplicationStatus::AwaitingCv, None, None).unwrap();

        let input = InboundCv {
            channel: InboundChannel::Whatsapp,
            sender: "+1 555 777 8888".to_string(),
            file_name: "cv.pdf".to_string(),
            file_path: "/tmp/cv.pdf".to_string(),
            subject_or_body: Some("Jorge Pereira <jorge@example.com>"),
            content_text: None,
        };
        let result = match_inbound(&mut conn, &cache, None, "claude-haiku", input).await.unwrap();
        assert!(matches!(result, MatchResult::Unmatched(_)));
    }
}
