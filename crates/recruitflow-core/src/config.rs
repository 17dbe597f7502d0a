use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default HTTP timeouts (seconds), per spec §5.
pub const SEND_TIMEOUT_SECS: u64 = 20;
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;
pub const LLM_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (recruitflow.toml + RECRUITFLOW_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecruitflowConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub voice_agent: VoiceAgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub whapi: WhapiConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for RecruitflowConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            voice_agent: VoiceAgentConfig::default(),
            llm: LlmConfig::default(),
            webhooks: WebhooksConfig::default(),
            whapi: WhapiConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl RecruitflowConfig {
    /// Load config from a TOML file with RECRUITFLOW_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. RECRUITFLOW_CONFIG env var
    ///   3. ./recruitflow.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RecruitflowConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RECRUITFLOW_").split("_"))
            .extract()
            .map_err(|e| crate::error::RecruitflowError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    std::env::var("RECRUITFLOW_CONFIG").unwrap_or_else(|_| "recruitflow.toml".to_string())
}

/// HTTP server bind address for the gateway process (webhook ingress).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { port: default_port(), bind: default_bind() }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "./recruitflow.db".to_string()
}

/// CV file storage directory (spec §5 "Shared resources": files are
/// written under a UUID-prefixed name to avoid collisions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_cv_dir")]
    pub cv_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { cv_dir: default_cv_dir() }
    }
}

fn default_cv_dir() -> String {
    "./data/cvs".to_string()
}

/// Scheduler-wide tuning (spec §4.2, §5, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone name used to evaluate calling-hour windows.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// `reconcile_stuck_calls`: age past which an IN_PROGRESS/INITIATED call
    /// is re-polled (minutes). Default 15 per spec §4.2.2.
    #[serde(default = "default_stuck_threshold_minutes")]
    pub stuck_threshold_minutes: i64,
    /// `reconcile_stuck_calls`: age past which a batch call with no
    /// conversation id is escalated to FAILED (minutes). Default 60.
    #[serde(default = "default_orphan_threshold_minutes")]
    pub orphan_threshold_minutes: i64,
    /// Max recipients per batch-submit chunk to the voice-agent API.
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,
    /// Seconds a job instance is allowed to be late before being skipped
    /// (misfire_grace_time, spec §5).
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            stuck_threshold_minutes: default_stuck_threshold_minutes(),
            orphan_threshold_minutes: default_orphan_threshold_minutes(),
            batch_chunk_size: default_batch_chunk_size(),
            misfire_grace_secs: default_misfire_grace_secs(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_stuck_threshold_minutes() -> i64 {
    15
}
fn default_orphan_threshold_minutes() -> i64 {
    60
}
fn default_batch_chunk_size() -> usize {
    50
}
fn default_misfire_grace_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceAgentConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_voice_agent_base_url")]
    pub base_url: String,
    pub agent_id: Option<String>,
    pub phone_number_id: Option<String>,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_voice_agent_base_url(),
            agent_id: None,
            phone_number_id: None,
        }
    }
}

fn default_voice_agent_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            fast_model: default_llm_fast_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "evaluation-model-default".to_string()
}
fn default_llm_fast_model() -> String {
    "extraction-model-fast".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}

/// Auth scheme for an incoming webhook source (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    /// `t={unix},v0={hex_hmac}` header, signed over `"{t}.{raw_body}"`.
    TimestampedHmacSha256,
    /// Static bearer token / custom header, constant-time compare.
    BearerToken,
    /// No authentication — development only.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// When true, missing secrets are tolerated with a warning instead of a
    /// hard 500 (spec §4.3: "In development-mode the check is skipped").
    #[serde(default)]
    pub development_mode: bool,
    /// Shared secret for the voice-agent webhook HMAC signature.
    pub voice_agent_secret: Option<String>,
    /// Signature timestamp tolerance, seconds. Default 300 per spec §4.3.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            development_mode: false,
            voice_agent_secret: None,
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_signature_tolerance() -> i64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhapiConfig {
    pub token: Option<String>,
    #[serde(default = "default_whapi_base_url")]
    pub base_url: String,
}

impl Default for WhapiConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_whapi_base_url(),
        }
    }
}

fn default_whapi_base_url() -> String {
    "https://gate.whapi.cloud".to_string()
}

/// Mailbox-polling config for `poll_cv_mailbox` (spec §4.2.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Persisted-setting analogue: the polling job is a no-op unless set.
    #[serde(default)]
    pub enabled: bool,
    /// Gmail label (or equivalent) to scope the unread-mail query to.
    pub inbox_label: Option<String>,
    pub from_address: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            inbox_label: None,
            from_address: None,
        }
    }
}
