use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::MessagingError;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub external_id: Option<String>,
}

/// Common interface implemented by every outbound transport (WhatsApp,
/// Email, …). Each send is a one-shot REST call — unlike a persistent chat
/// adapter there is no `connect`/`disconnect` lifecycle to manage, since
/// Whapi and the mail API are both stateless per request.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"whatsapp"`).
    fn name(&self) -> &str;

    /// Deliver one message. `subject` is ignored by channels that don't
    /// carry one (WhatsApp).
    async fn send(&self, to: &str, subject: Option<&str>, body: &str) -> Result<SendOutcome, MessagingError>;
}

/// WhatsApp delivery via the Whapi REST API (spec §4.3/§6, ported from
/// `original_source/messaging/services.py::WhapiService`).
pub struct WhapiChannel {
    client: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl WhapiChannel {
    pub fn new(token: Option<String>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(recruitflow_core::config::SEND_TIMEOUT_SECS))
                .build()
                .expect("reqwest client builds"),
            token,
            base_url,
        }
    }
}

#[async_trait]
impl Channel for WhapiChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, to: &str, _subject: Option<&str>, body: &str) -> Result<SendOutcome, MessagingError> {
        let Some(token) = self.token.as_deref() else {
            warn!("Whapi credentials not configured — message not sent");
            return Err(MessagingError::NotConfigured("whapi token missing".to_string()));
        };

        let jid_number = to.trim_start_matches('+');
        let payload = serde_json::json!({
            "to": format!("{jid_number}@s.whatsapp.net"),
            "body": body,
        });

        let resp = self
            .client
            .post(format!("{}/messages/text", self.base_url.trim_end_matches('/')))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MessagingError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(MessagingError::SendFailed(format!("whapi returned {status}")));
        }

        let data: serde_json::Value = resp.json().await.unwrap_or_default();
        let external_id = data
            .get("message_id")
            .or_else(|| data.get("id"))
            .or_else(|| data.get("message").and_then(|m| m.get("id")))
            .or_else(|| data.get("messages").and_then(|m| m.get(0)).and_then(|m| m.get("id")))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        info!(%to, ?external_id, "WhatsApp message sent");
        Ok(SendOutcome { external_id })
    }
}

/// Email delivery placeholder. `original_source/messaging/services.py`'s
/// `GmailService` authenticates via Google OAuth2 + the Gmail API — concrete
/// OAuth mail delivery is out of scope here, so this channel mirrors Whapi's
/// missing-credentials branch: it always reports not-configured rather than
/// silently pretending to send.
pub struct StubMailChannel;

#[async_trait]
impl Channel for StubMailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, _to: &str, _subject: Option<&str>, _body: &str) -> Result<SendOutcome, MessagingError> {
        warn!("mail transport not configured — message not sent");
        Err(MessagingError::NotConfigured("mail transport not wired".to_string()))
    }
}
