use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use recruitflow_calls::VoiceAgentClient;
use recruitflow_core::config::RecruitflowConfig;
use recruitflow_eval::LlmProvider;
use recruitflow_messaging::Channel;
use recruitflow_state::SidebarCache;
use rusqlite::Connection;
use tokio::sync::Mutex;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: RecruitflowConfig,
    /// The webhook handlers need to serialise reads/writes with the
    /// scheduler, which also holds the connection behind its own mutex —
    /// both processes share the same SQLite file on disk.
    pub conn: Mutex<Connection>,
    pub cache: Arc<SidebarCache>,
    pub voice_agent: Arc<VoiceAgentClient>,
    pub llm_provider: Arc<dyn LlmProvider>,
    pub llm_model: String,
    pub extraction_model: String,
    pub whatsapp: Arc<dyn Channel>,
    pub email: Arc<dyn Channel>,
    /// Used to download inbound WhatsApp media attachments (spec §4.3).
    pub http_client: reqwest::Client,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RecruitflowConfig,
        conn: Connection,
        cache: Arc<SidebarCache>,
        voice_agent: Arc<VoiceAgentClient>,
        llm_provider: Arc<dyn LlmProvider>,
        llm_model: String,
        extraction_model: String,
        whatsapp: Arc<dyn Channel>,
        email: Arc<dyn Channel>,
    ) -> Self {
        Self {
            config,
            conn: Mutex::new(conn),
            cache,
            voice_agent,
            llm_provider,
            llm_model,
            extraction_model,
            whatsapp,
            email,
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(recruitflow_core::config::DOWNLOAD_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
        }
    }
}

/// Assemble the full Axum router: health probe + the two webhook sources.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/webhooks/voice-agent", post(crate::http::webhooks::voice_agent_webhook))
        .route("/webhooks/whatsapp", post(crate::http::webhooks::whatsapp_webhook))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
