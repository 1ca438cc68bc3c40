//! Configuration management for the bridge.

use crate::{CoreError, CoreResult, Paths};
use locker_protocol_types::IdRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default webhook URL (can be baked in at compile time via SMARTLOCKER_WEBHOOK_URL).
pub const DEFAULT_WEBHOOK_URL: Option<&str> = option_env!("SMARTLOCKER_WEBHOOK_URL");

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// RFCOMM device bound to the locker controller.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/rfcomm0";

/// What to answer a borrow request with when the authority cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflinePolicy {
    /// Grant the borrow and record it through the normal commit path.
    Optimistic,
    /// Refuse the borrow.
    #[default]
    Pessimistic,
}

impl FromStr for OfflinePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" | "allow" => Ok(Self::Optimistic),
            "pessimistic" | "deny" => Ok(Self::Pessimistic),
            other => Err(CoreError::Config(format!("unknown offline policy: {other}"))),
        }
    }
}

/// Remote authority call settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Attempts per operation, including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl AuthorityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Where locker bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// A character device such as an RFCOMM serial port.
    Device { path: PathBuf },
    /// A TCP listener that accepts one locker at a time.
    Tcp { bind: String },
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Device {
            path: PathBuf::from(DEFAULT_DEVICE_PATH),
        }
    }
}

/// Connection loop timing and framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often to retry opening the transport while disconnected.
    pub poll_interval_ms: u64,
    /// Pause after a disconnect before reopening.
    pub reconnect_delay_ms: u64,
    /// Byte that ends a command line.
    pub line_terminator: char,
    /// Longest line kept before the buffer is discarded.
    pub max_line_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            reconnect_delay_ms: 1000,
            line_terminator: '\n',
            max_line_len: 256,
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Main bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Webhook endpoint of the remote authority.
    pub webhook_url: Option<String>,
    pub authority: AuthorityConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    /// Seconds between reconciliation passes.
    pub reconcile_interval_secs: u64,
    pub id_rules: IdRules,
    pub offline_policy: OfflinePolicy,
    /// Override for the pending-action document location.
    pub pending_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            webhook_url: DEFAULT_WEBHOOK_URL.map(|s| s.to_string()),
            authority: AuthorityConfig::default(),
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            reconcile_interval_secs: 60,
            id_rules: IdRules::default(),
            offline_policy: OfflinePolicy::default(),
            pending_file: None,
        }
    }
}

impl Config {
    /// Load configuration from `paths`, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = non_empty("SMARTLOCKER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty("SMARTLOCKER_WEBHOOK_URL") {
            self.webhook_url = Some(url);
        }
        if let Some(device) = non_empty("SMARTLOCKER_DEVICE") {
            self.transport = TransportConfig::Device {
                path: PathBuf::from(device),
            };
        }
    }

    /// Get the webhook URL as a parsed URL.
    pub fn webhook_url(&self) -> CoreResult<Url> {
        let raw = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| CoreError::Config("no webhook URL configured".to_string()))?;
        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::Config(format!(
                "webhook URL must be http or https, got {other}"
            ))),
        }
    }

    /// Pending-action document, honoring the override.
    pub fn pending_file(&self, paths: &Paths) -> PathBuf {
        self.pending_file
            .clone()
            .unwrap_or_else(|| paths.pending_file())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.session.line_terminator.is_ascii() {
            return Err(CoreError::Config(
                "line_terminator must be a single ASCII character".to_string(),
            ));
        }
        if self.session.poll_interval_ms == 0 || self.session.reconnect_delay_ms == 0 {
            return Err(CoreError::Config(
                "poll_interval_ms and reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self.session.max_line_len == 0 {
            return Err(CoreError::Config("max_line_len must be positive".to_string()));
        }
        if self.authority.max_attempts == 0 {
            return Err(CoreError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.id_rules.min_len == 0 || self.id_rules.min_len > self.id_rules.max_len {
            return Err(CoreError::Config(format!(
                "invalid id length bounds: {}..={}",
                self.id_rules.min_len, self.id_rules.max_len
            )));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(CoreError::Config(
                "reconcile_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
