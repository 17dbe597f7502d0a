use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use recruitflow_core::config::{MailConfig, SchedulerConfig};
use recruitflow_eval::LlmProvider;
use recruitflow_messaging::{Channel, Mailbox};
use recruitflow_state::SidebarCache;
use rusqlite::Connection;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::db::{finish_run, init_db, start_run};
use crate::jobs;
use crate::types::JobName;
use recruitflow_calls::VoiceAgentClient;

type SharedConn = Arc<Mutex<Connection>>;

/// Drives the five fixed periodic jobs (spec §4.2). Unlike the job-table
/// model this replaces, there is no persisted schedule to recompute — each
/// job's cadence is the constant `JobName::interval()`, and the only
/// per-run state kept is the `job_runs` history log.
pub struct SchedulerEngine {
    conn: SharedConn,
    cache: Arc<SidebarCache>,
    config: SchedulerConfig,
    mail_config: MailConfig,
    voice_agent: Arc<VoiceAgentClient>,
    llm_provider: Arc<dyn LlmProvider>,
    llm_model: String,
    extraction_model: String,
    whatsapp: Arc<dyn Channel>,
    email: Arc<dyn Channel>,
    mailbox: Arc<dyn Mailbox>,
    cv_dir: String,
}

impl SchedulerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Connection,
        cache: Arc<SidebarCache>,
        config: SchedulerConfig,
        mail_config: MailConfig,
        voice_agent: Arc<VoiceAgentClient>,
        llm_provider: Arc<dyn LlmProvider>,
        llm_model: String,
        extraction_model: String,
        whatsapp: Arc<dyn Channel>,
        email: Arc<dyn Channel>,
        mailbox: Arc<dyn Mailbox>,
        cv_dir: String,
    ) -> crate::error::Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache,
            config,
            mail_config,
            voice_agent,
            llm_provider,
            llm_model,
            extraction_model,
            whatsapp,
            email,
            mailbox,
            cv_dir,
        })
    }

    /// Spawn all job loops and wait for every one to exit after `shutdown`
    /// broadcasts `true`. `poll_cv_mailbox` is only spawned when
    /// `mail.enabled` is set (spec §4.2.5) — there is nothing to poll
    /// otherwise.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!("scheduler engine started");
        let misfire_grace = Duration::from_secs(self.config.misfire_grace_secs);
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        {
            let conn = self.conn.clone();
            let cache = self.cache.clone();
            let voice_agent = self.voice_agent.clone();
            let timezone = self.config.timezone.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(run_job_loop(JobName::DispatchCalls, conn, misfire_grace, shutdown, move |conn| {
                let cache = cache.clone();
                let voice_agent = voice_agent.clone();
                let timezone = timezone.clone();
                async move {
                    let mut conn = conn.lock().await;
                    jobs::dispatch_calls::run(&mut conn, &cache, &voice_agent, &timezone).await
                }
            })));
        }

        {
            let conn = self.conn.clone();
            let cache = self.cache.clone();
            let voice_agent = self.voice_agent.clone();
            let llm_provider = self.llm_provider.clone();
            let llm_model = self.llm_model.clone();
            let whatsapp = self.whatsapp.clone();
            let email = self.email.clone();
            let stuck_threshold_minutes = self.config.stuck_threshold_minutes;
            let orphan_threshold_minutes = self.config.orphan_threshold_minutes;
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(run_job_loop(
                JobName::ReconcileStuckCalls,
                conn,
                misfire_grace,
                shutdown,
                move |conn| {
                    let cache = cache.clone();
                    let voice_agent = voice_agent.clone();
                    let llm_provider = llm_provider.clone();
                    let llm_model = llm_model.clone();
                    let whatsapp = whatsapp.clone();
                    let email = email.clone();
                    async move {
                        let mut conn = conn.lock().await;
                        jobs::reconcile_stuck_calls::run(
                            &mut conn,
                            &cache,
                            &voice_agent,
                            llm_provider.as_ref(),
                            &llm_model,
                            whatsapp.as_ref(),
                            email.as_ref(),
                            stuck_threshold_minutes,
                            orphan_threshold_minutes,
                        )
                        .await
                    }
                },
            )));
        }

        {
            let conn = self.conn.clone();
            let cache = self.cache.clone();
            let whatsapp = self.whatsapp.clone();
            let email = self.email.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(run_job_loop(
                JobName::AdvanceCvFollowups,
                conn,
                misfire_grace,
                shutdown,
                move |conn| {
                    let cache = cache.clone();
                    let whatsapp = whatsapp.clone();
                    let email = email.clone();
                    async move {
                        let mut conn = conn.lock().await;
                        jobs::advance_cv_followups::run(&mut conn, &cache, whatsapp.as_ref(), email.as_ref()).await
                    }
                },
            )));
        }

        {
            let conn = self.conn.clone();
            let cache = self.cache.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(run_job_loop(
                JobName::CloseStaleRejected,
                conn,
                misfire_grace,
                shutdown,
                move |conn| {
                    let cache = cache.clone();
                    async move {
                        let mut conn = conn.lock().await;
                        jobs::close_stale_rejected::run(&mut conn, &cache)
                    }
                },
            )));
        }

        if self.mail_config.enabled {
            let conn = self.conn.clone();
            let cache = self.cache.clone();
            let mailbox = self.mailbox.clone();
            let llm_provider = self.llm_provider.clone();
            let extraction_model = self.extraction_model.clone();
            let inbox_label = self.mail_config.inbox_label.clone();
            let cv_dir = self.cv_dir.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(run_job_loop(JobName::PollCvMailbox, conn, misfire_grace, shutdown, move |conn| {
                let cache = cache.clone();
                let mailbox = mailbox.clone();
                let llm_provider = llm_provider.clone();
                let extraction_model = extraction_model.clone();
                let inbox_label = inbox_label.clone();
                let cv_dir = cv_dir.clone();
                async move {
                    let mut conn = conn.lock().await;
                    jobs::poll_cv_mailbox::run(
                        &mut conn,
                        &cache,
                        mailbox.as_ref(),
                        Some(llm_provider.as_ref()),
                        &extraction_model,
                        inbox_label.as_deref(),
                        &cv_dir,
                    )
                    .await
                }
            })));
        } else {
            info!("mail.enabled is false — poll_cv_mailbox is not started");
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "a scheduler job loop panicked");
            }
        }
        info!("scheduler engine shut down");
    }
}

/// Drive one job on its fixed cadence. Missed deadlines are coalesced into
/// a single future run (spec §5's "coalescing collapses multiple missed
/// starts into one"); a deadline more than `misfire_grace` late is skipped
/// outright rather than run late, matching the `misfire_grace_time`
/// semantics the scheduler's original implementation used.
async fn run_job_loop<F, Fut>(
    name: JobName,
    conn: SharedConn,
    misfire_grace: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut action: F,
) where
    F: FnMut(SharedConn) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = crate::error::Result<()>> + Send,
{
    let period = name.interval();
    let mut next_due = Instant::now() + period;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_due) => {
                let fired_at = Instant::now();
                let lateness = fired_at.saturating_duration_since(next_due);
                while next_due <= fired_at {
                    next_due += period;
                }

                if lateness > misfire_grace {
                    warn!(job = %name, late_secs = lateness.as_secs(), "run skipped — misfire grace exceeded");
                    continue;
                }

                let started_at = Utc::now().to_rfc3339();
                let run_id = {
                    let guard = conn.lock().await;
                    start_run(&guard, name.as_str(), &started_at).ok()
                };

                let result = action(conn.clone()).await;

                let finished_at = Utc::now().to_rfc3339();
                if let Some(run_id) = run_id {
                    let detail = result.as_ref().err().map(|e| e.to_string());
                    let guard = conn.lock().await;
                    let _ = finish_run(&guard, run_id, &finished_at, result.is_ok(), detail.as_deref());
                }

                match result {
                    Ok(()) => info!(job = %name, "job run completed"),
                    Err(e) => error!(job = %name, error = %e, "job run failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(job = %name, "job loop shutting down");
                    break;
                }
            }
        }
    }
}
