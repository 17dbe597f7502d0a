use std::net::SocketAddr;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::info;

use recruitflow_calls::VoiceAgentClient;
use recruitflow_core::config::RecruitflowConfig;
use recruitflow_eval::{AnthropicProvider, LlmProvider};
use recruitflow_messaging::{Channel, StubMailChannel, StubMailbox, WhapiChannel};
use recruitflow_scheduler::SchedulerEngine;
use recruitflow_state::SidebarCache;

mod app;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recruitflow_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("RECRUITFLOW_CONFIG").ok();
    let config = RecruitflowConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        RecruitflowConfig::default()
    });

    let gateway_conn = Connection::open(&config.database.path)?;
    recruitflow_candidates::init_db(&gateway_conn)?;
    recruitflow_state::init_db(&gateway_conn)?;
    recruitflow_calls::init_db(&gateway_conn)?;
    recruitflow_eval::init_db(&gateway_conn)?;
    recruitflow_matching::init_db(&gateway_conn)?;
    recruitflow_messaging::init_db(&gateway_conn)?;

    let cache = Arc::new(SidebarCache::new());

    let voice_agent = Arc::new(VoiceAgentClient::new(
        config.voice_agent.api_key.clone().unwrap_or_default(),
        config.voice_agent.base_url.clone(),
        config.voice_agent.agent_id.clone().unwrap_or_default(),
        config.voice_agent.phone_number_id.clone().unwrap_or_default(),
    ));

    let llm_provider: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(
        config.llm.api_key.clone().unwrap_or_default(),
        Some(config.llm.base_url.clone()),
    ));

    let whatsapp: Arc<dyn Channel> = Arc::new(WhapiChannel::new(config.whapi.token.clone(), config.whapi.base_url.clone()));
    let email: Arc<dyn Channel> = Arc::new(StubMailChannel);

    let state = Arc::new(app::AppState::new(
        config.clone(),
        gateway_conn,
        cache.clone(),
        voice_agent.clone(),
        llm_provider.clone(),
        config.llm.model.clone(),
        config.llm.fast_model.clone(),
        whatsapp.clone(),
        email.clone(),
    ));
    let router = app::build_router(state.clone());

    let scheduler_conn = Connection::open(&config.database.path)?;
    let engine = SchedulerEngine::new(
        scheduler_conn,
        cache.clone(),
        config.scheduler.clone(),
        config.mail.clone(),
        voice_agent,
        llm_provider,
        config.llm.model.clone(),
        config.llm.fast_model.clone(),
        whatsapp,
        email,
        Arc::new(StubMailbox),
        config.storage.cv_dir.clone(),
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(engine.run(shutdown_rx));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("recruitflow gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    scheduler_handle.await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, waiting for in-flight jobs to finish");
}
