//! `reconcile_stuck_calls` (spec §4.2.2, every 10 minutes): the webhook
//! safety net. Polls any call stuck `IN_PROGRESS`/`INITIATED` past the
//! stuck threshold, and escalates batch calls that never bound a
//! conversation id past the orphan threshold.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::warn;

use recruitflow_calls::{apply_call_result, escalate_orphan_call, get_call, list_orphaned_batch_calls, list_stuck_calls, VoiceAgentClient};
use recruitflow_candidates::{get_candidate, get_position};
use recruitflow_eval::{evaluate_call, LlmProvider};
use recruitflow_messaging::Channel;
use recruitflow_state::{get_application, SidebarCache};

use crate::error::Result;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    conn: &mut Connection,
    cache: &SidebarCache,
    voice_agent: &VoiceAgentClient,
    llm: &dyn LlmProvider,
    llm_model: &str,
    whatsapp: &dyn Channel,
    email: &dyn Channel,
    stuck_threshold_minutes: i64,
    orphan_threshold_minutes: i64,
) -> Result<()> {
    let now = Utc::now();

    let stuck_cutoff = (now - Duration::minutes(stuck_threshold_minutes)).to_rfc3339();
    for call in list_stuck_calls(conn, &stuck_cutoff)? {
        let Some(conversation_id) = call.external_conversation_id.clone() else {
            continue;
        };
        let data = match voice_agent.poll_call(&conversation_id).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!(call_id = call.id, conversation_id, "no response from any voice-agent poll endpoint");
                continue;
            }
            Err(e) => {
                warn!(call_id = call.id, error = %e, "voice-agent poll failed");
                continue;
            }
        };

        let is_completed = match apply_call_result(conn, cache, &call, &data) {
            Ok((_, completed)) => completed,
            Err(e) => {
                warn!(call_id = call.id, error = %e, "failed to apply polled call result");
                continue;
            }
        };
        if !is_completed {
            continue;
        }

        let Some(application) = get_application(conn, call.application_id)? else { continue };
        let Some(candidate) = get_candidate(conn, application.candidate_id)? else { continue };
        let Some(position) = get_position(conn, application.position_id)? else { continue };
        let Some(updated_call) = get_call(conn, call.id)? else { continue };
        if let Err(e) = evaluate_call(conn, cache, llm, llm_model, &updated_call, &candidate, &position, whatsapp, email).await {
            warn!(call_id = call.id, error = %e, "evaluation failed after reconciliation");
        }
    }

    let orphan_cutoff = (now - Duration::minutes(orphan_threshold_minutes)).to_rfc3339();
    for call in list_orphaned_batch_calls(conn, &orphan_cutoff)? {
        if let Err(e) = escalate_orphan_call(conn, cache, &call) {
            warn!(call_id = call.id, error = %e, "failed to escalate orphaned batch call");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recruitflow_calls::{create_call_with_batch_id, create_call_with_conversation_id, init_db as init_calls_db, CallStatus};
    use recruitflow_eval::{ChatRequest, ChatResponse, ProviderError};
    use recruitflow_messaging::SendOutcome;
    use recruitflow_state::{create_application, get_application, init_db as init_state_db, ApplicationStatus};

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            unreachable!("not exercised by these tests — no call reaches CALL_COMPLETED")
        }
    }

    struct StubChannel;

    #[async_trait]
    impl Channel for StubChannel {
        fn name(&self) -> &str {
            "stub"
        }
        async fn send(&self, _to: &str, _subject: Option<&str>, _body: &str) -> std::result::Result<SendOutcome, recruitflow_messaging::MessagingError> {
            Ok(SendOutcome { external_id: Some("ext-1".into()) })
        }
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_state_db(&conn).unwrap();
        init_calls_db(&conn).unwrap();
        conn
    }

    fn unconfigured_client() -> VoiceAgentClient {
        VoiceAgentClient::new(String::new(), "https://example.invalid".into(), String::new(), String::new())
    }

    #[tokio::test]
    async fn stuck_call_with_unconfigured_client_is_left_untouched() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        let call = create_call_with_conversation_id(&conn, app.id, 1, "conv_1").unwrap();
        conn.execute("UPDATE calls SET initiated_at = '2020-01-01T00:00:00Z' WHERE id = ?1", [call.id]).unwrap();

        let client = unconfigured_client();
        let llm = StubProvider;
        let wa = StubChannel;
        let email = StubChannel;
        run(&mut conn, &cache, &client, &llm, "test-model", &wa, &email, 15, 60).await.unwrap();

        let reloaded = get_call(&conn, call.id).unwrap().unwrap();
        assert_eq!(reloaded.status, CallStatus::Initiated);
    }

    #[tokio::test]
    async fn orphaned_batch_call_fails_the_application() {
        let mut conn = test_conn();
        let cache = SidebarCache::new();
        let app = create_application(&conn, 1, 1).unwrap();
        conn.execute("UPDATE applications SET status = 'CALL_IN_PROGRESS' WHERE id = ?1", [app.id]).unwrap();
        let call = create_call_with_batch_id(&conn, app.id, 1, "batch_1").unwrap();
        conn.execute("UPDATE calls SET initiated_at = '2020-01-01T00:00:00Z' WHERE id = ?1", [call.id]).unwrap();

        let client = unconfigured_client();
        let llm = StubProvider;
        let wa = StubChannel;
        let email = StubChannel;
        run(&mut conn, &cache, &client, &llm, "test-model", &wa, &email, 15, 60).await.unwrap();

        let reloaded = get_call(&conn, call.id).unwrap().unwrap();
        assert_eq!(reloaded.status, CallStatus::Failed);

        let reloaded_app = get_application(&conn, app.id).unwrap().unwrap();
        assert_eq!(reloaded_app.status, ApplicationStatus::CallFailed);
    }
}
