//! # Observability
//!
//! Structured logging for the SmartLocker bridge.
//!
//! Components are **log producers** only. The binary calls
//! `observability::init_with_config()` once at startup and everything else
//! uses plain `tracing` macros with structured fields:
//!
//! ```rust,ignore
//! tracing::info!(student_id = %id, verdict = %verdict, "Borrow handled");
//! ```
//!
//! ## Dev Mode
//!
//! With the `dev` feature (on by default) every line is written as JSONL to
//! `~/.smartlocker/logs/bridge.jsonl`, which can be followed with
//! `tail -f ~/.smartlocker/logs/bridge.jsonl | jq`. A compact human-readable
//! copy can also go to stderr.
//!
//! Without `dev`, logs go to stderr only.

#[cfg(feature = "dev")]
mod dev;

mod json_layer;

use std::path::PathBuf;

pub use json_layer::LogEntry;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.smartlocker/logs/bridge.jsonl` in dev mode.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_config(config: LogConfig) {
    #[cfg(feature = "dev")]
    {
        dev::init_dev_subscriber(&config);
    }

    #[cfg(not(feature = "dev"))]
    {
        use tracing_subscriber::util::SubscriberInitExt;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
            )
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .finish()
            .try_init();
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }
}
