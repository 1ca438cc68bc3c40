//! File system paths for the bridge.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Pending-action document filename under the base directory.
const PENDING_FILE_NAME: &str = "pending.json";

/// Manages file system paths for the bridge.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.smartlocker)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.smartlocker`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".smartlocker"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.smartlocker).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.smartlocker/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the pending-action document (~/.smartlocker/pending.json).
    pub fn pending_file(&self) -> PathBuf {
        self.base_dir.join(PENDING_FILE_NAME)
    }

    /// Get the logs directory (~/.smartlocker/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file (~/.smartlocker/logs/bridge.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("bridge.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
