use std::time::Duration;

use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::{info, warn};

use recruitflow_candidates::{Candidate, Position};
use recruitflow_core::placeholders::PlaceholderMap;
use recruitflow_state::{transition, ApplicationStatus, SidebarCache};

use crate::crud::{create_call_with_batch_id, create_call_with_conversation_id, next_attempt_number};
use crate::error::{CallError, Result};
use crate::types::Call;

const SEND_TIMEOUT: Duration = Duration::from_secs(20);

/// Response field names vary across voice-agent API versions (spec §6).
const CONVERSATION_ID_KEYS: [&str; 4] = ["conversation_id", "call_id", "id", "call_sid"];

/// Endpoints tried in order when polling for a stuck call's state (spec
/// §4.2.2 — fallback polling).
const POLL_ENDPOINT_TEMPLATES: [&str; 4] = [
    "/v1/convai/conversations/{id}",
    "/v1/convai/calls/{id}",
    "/v1/conversations/{id}",
    "/v1/calls/{id}",
];

/// Up to this many recipients per batch submission (spec §4.2.1).
pub const BATCH_CHUNK_SIZE: usize = 50;

pub struct VoiceAgentClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    agent_id: String,
    phone_number_id: String,
}

/// One application ready to be called, with its candidate/position
/// already resolved — avoids re-querying inside the dispatch loop.
pub struct CallCandidate<'a> {
    pub application_id: i64,
    pub candidate: &'a Candidate,
    pub position: &'a Position,
}

impl VoiceAgentClient {
    pub fn new(api_key: String, base_url: String, agent_id: String, phone_number_id: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .expect("reqwest client builds"),
            api_key,
            base_url,
            agent_id,
            phone_number_id,
        }
    }

    fn check_configured(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(CallError::NotConfigured("voice_agent.api_key"));
        }
        if self.agent_id.is_empty() {
            return Err(CallError::NotConfigured("voice_agent.agent_id"));
        }
        if self.phone_number_id.is_empty() {
            return Err(CallError::NotConfigured("voice_agent.phone_number_id"));
        }
        Ok(())
    }

    /// Place a single outbound call — used for callbacks, where the caller
    /// wants the conversation id immediately rather than waiting on a
    /// late-bound webhook (spec §4.2.1's callback queue).
    pub async fn dispatch_single(
        &self,
        conn: &mut Connection,
        cache: &SidebarCache,
        item: &CallCandidate<'_>,
    ) -> Result<Call> {
        self.check_configured()?;
        let phone = item
            .candidate
            .phone
            .as_deref()
            .ok_or(CallError::MissingPhone(item.candidate.id))?;

        let placeholders = placeholder_map(item.candidate, item.position);
        let system_prompt = placeholders.render(&item.position.system_prompt);
        let first_message = placeholders.render(&item.position.first_message);

        let payload = json!({
            "agent_id": self.agent_id,
            "agent_phone_number_id": self.phone_number_id,
            "to_number": phone,
            "conversation_initiation_client_data": {
                "conversation_config_override": {
                    "agent": {
                        "prompt": {"prompt": system_prompt},
                        "first_message": first_message,
                    }
                }
            },
        });

        let url = format!("{}/v1/convai/twilio/outbound-call", self.base_url);
        let body = self.post(&url, &payload).await?;
        let conversation_id = extract_identifier(&body);

        let attempt_number = next_attempt_number(conn, item.application_id)?;
        let call = match conversation_id {
            Some(id) => create_call_with_conversation_id(conn, item.application_id, attempt_number, &id)?,
            None => {
                warn!(application_id = item.application_id, "voice-agent response carried no conversation id");
                create_call_with_batch_id(conn, item.application_id, attempt_number, "unknown")?
            }
        };
        transition(conn, cache, item.application_id, ApplicationStatus::CallInProgress, None, None)?;
        info!(call_id = call.id, application_id = item.application_id, "call dispatched");
        Ok(call)
    }

    /// Submit every item as one or more batch-calling requests, chunked at
    /// `BATCH_CHUNK_SIZE`. On a chunk failure, every application still in
    /// `CALL_QUEUED` is transitioned to `CALL_FAILED` with an audit note
    /// (spec §4.2.1) — the failure does not abort remaining chunks.
    pub async fn dispatch_batch(
        &self,
        conn: &mut Connection,
        cache: &SidebarCache,
        items: &[CallCandidate<'_>],
    ) -> Result<Vec<Call>> {
        self.check_configured()?;
        let mut created = Vec::new();
        for chunk in items.chunks(BATCH_CHUNK_SIZE) {
            match self.submit_batch_chunk(conn, cache, chunk).await {
                Ok(calls) => created.extend(calls),
                Err(e) => {
                    warn!(error = %e, "batch chunk submission failed, failing queued applications");
                    for item in chunk {
                        let _ = transition(
                            conn,
                            cache,
                            item.application_id,
                            ApplicationStatus::CallFailed,
                            None,
                            Some("batch submission failed"),
                        );
                    }
                }
            }
        }
        Ok(created)
    }

    async fn submit_batch_chunk(
        &self,
        conn: &mut Connection,
        cache: &SidebarCache,
        chunk: &[CallCandidate<'_>],
    ) -> Result<Vec<Call>> {
        let mut recipients = Vec::new();
        let mut eligible = Vec::new();
        for item in chunk {
            let Some(phone) = item.candidate.phone.as_deref() else {
                warn!(application_id = item.application_id, "skipping application in batch — no phone number");
                continue;
            };
            let placeholders = placeholder_map(item.candidate, item.position);
            let system_prompt = placeholders.render(&item.position.system_prompt);
            let first_message = placeholders.render(&item.position.first_message);
            recipients.push(json!({
                "phone_number": phone,
                "conversation_initiation_client_data": {
                    "user_id": item.application_id.to_string(),
                    "conversation_config_override": {
                        "agent": {
                            "prompt": {"prompt": system_prompt},
                            "first_message": first_message,
                        }
                    },
                },
            }));
            eligible.push(item);
        }

        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let payload = json!({
            "call_name": format!("RecruitFlow Batch — {} call(s)", recipients.len()),
            "agent_id": self.agent_id,
            "agent_phone_number_id": self.phone_number_id,
            "recipients": recipients,
        });

        let url = format!("{}/v1/convai/batch-calling/submit", self.base_url);
        let body = self.post(&url, &payload).await?;
        let batch_id = body
            .get("batch_id")
            .or_else(|| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CallError::MissingBatchId(body.to_string()))?;

        let mut calls = Vec::new();
        for item in eligible {
            let attempt_number = next_attempt_number(conn, item.application_id)?;
            let call = create_call_with_batch_id(conn, item.application_id, attempt_number, &batch_id)?;
            transition(conn, cache, item.application_id, ApplicationStatus::CallInProgress, None, None)?;
            calls.push(call);
        }
        info!(batch_id, count = calls.len(), "batch call submitted");
        Ok(calls)
    }

    /// Try each fallback-polling endpoint in order; return the first 2xx
    /// JSON body, or `None` if every endpoint 404s or errors (spec §4.2.2).
    /// Used by `reconcile_stuck_calls` as the webhook fallback.
    pub async fn poll_call(&self, conversation_id: &str) -> Result<Option<Value>> {
        self.check_configured()?;
        for template in POLL_ENDPOINT_TEMPLATES {
            let url = format!("{}{}", self.base_url, template.replace("{id}", conversation_id));
            let resp = match self.client.get(&url).header("xi-api-key", &self.api_key).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url, error = %e, "voice-agent poll network error");
                    continue;
                }
            };
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !resp.status().is_success() {
                warn!(url, status = %resp.status(), "voice-agent poll returned an error");
                continue;
            }
            match resp.json::<Value>().await {
                Ok(body) => return Ok(Some(body)),
                Err(_) => continue,
            }
        }
        Ok(None)
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        Ok(resp.json::<Value>().await?)
    }
}

fn extract_identifier(body: &Value) -> Option<String> {
    CONVERSATION_ID_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
}

fn placeholder_map(candidate: &Candidate, position: &Position) -> PlaceholderMap {
    let form_answers = if candidate.form_answers.is_empty() {
        "No pre-screening answers available.".to_string()
    } else {
        candidate
            .form_answers
            .iter()
            .map(|(k, v)| format!("Q: {}\nA: {v}", capitalize_question(k)))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    PlaceholderMap::new()
        .with("candidate_name", candidate.full_name.clone())
        .with("candidate_first_name", candidate.first_name.clone())
        .with("candidate_email", candidate.email.clone().unwrap_or_default())
        .with("position_title", position.title.clone())
        .with("position_description", position.description.clone())
        .with("form_answers", form_answers)
}

fn capitalize_question(key: &str) -> String {
    let words = key.replace('_', " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_identifier_tries_keys_in_order() {
        assert_eq!(extract_identifier(&json!({"call_id": "c1"})), Some("c1".to_string()));
        assert_eq!(extract_identifier(&json!({"id": "i1"})), Some("i1".to_string()));
        assert_eq!(extract_identifier(&json!({})), None);
    }

    #[test]
    fn form_answers_render_as_qa_block() {
        let mut candidate_form = std::collections::HashMap::new();
        candidate_form.insert("drivers_license".to_string(), "Yes".to_string());
        let candidate = Candidate {
            id: 1,
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            full_name: "Ana Silva".into(),
            phone: Some("+5511988887777".into()),
            email: None,
            whatsapp_number: None,
            lead_source_id: None,
            form_answers: candidate_form,
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let position = Position {
            id: 1,
            title: "Driver".into(),
            description: "".into(),
            status: recruitflow_candidates::PositionStatus::Open,
            qualification_prompt: "".into(),
            system_prompt: "Hi {candidate_first_name}".into(),
            first_message: "".into(),
            calling_hour_start: 9,
            calling_hour_end: 18,
            call_retry_max: 3,
            call_retry_interval_minutes: 60,
            follow_up_interval_hours: 24,
            rejected_cv_timeout_days: 3,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let map = placeholder_map(&candidate, &position);
        assert_eq!(map.render("{form_answers}"), "Q: Drivers license\nA: Yes");
        assert_eq!(map.render(&position.system_prompt), "Hi Ana");
    }
}
