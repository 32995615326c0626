use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 4;
pub const DEFAULT_RESTART_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_SMTP_PORT: u16 = 465; // implicit TLS

/// Top-level config (agenda.toml + AGENDA_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgendaConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// When absent, notifications are only logged.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
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

/// Timing knobs for the notification scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on how long the loop idles when nothing is due sooner.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Size of the delivery worker pool.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,
    /// Pause before the supervisor restarts a faulted loop.
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_concurrent_deliveries: DEFAULT_MAX_CONCURRENT_DELIVERIES,
            restart_backoff_ms: DEFAULT_RESTART_BACKOFF_MS,
        }
    }
}

/// Outgoing mail server. Connections use implicit TLS (SMTPS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Mailbox used in the `From` header, e.g. `Agenda <agenda@example.com>`.
    /// Defaults to `username`.
    pub from: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_max_concurrent_deliveries() -> usize {
    DEFAULT_MAX_CONCURRENT_DELIVERIES
}
fn default_restart_backoff_ms() -> u64 {
    DEFAULT_RESTART_BACKOFF_MS
}
fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agenda/agenda.db", home)
}

impl AgendaConfig {
    /// Load config from a TOML file with AGENDA_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `AGENDA_SCHEDULER__POLL_INTERVAL_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        let config: AgendaConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("AGENDA_").split("__"))
            .extract()
            .map_err(|e| crate::error::AgendaError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// Ensure the parent directory for a file path exists.
pub fn ensure_parent_dir(path: &str) -> crate::error::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.agenda/agenda.toml", home)
}
