//! Dev-mode logging configuration.
//!
//! Writes structured JSONL logs to a central file that can be tailed
//! by external tools, plus an optional compact stderr stream.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Central log file location: `~/.smartlocker/logs/bridge.jsonl`.
fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".smartlocker").join("logs").join("bridge.jsonl"))
}

/// Append-only file writer shared by every event.
#[derive(Clone)]
pub struct CentralLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl CentralLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let result = guard.write(buf);
        // One flush per line keeps `tail -f` current
        guard.flush()?;
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// MakeWriter implementation for tracing-subscriber
#[derive(Clone)]
pub struct WriterFactory {
    writer: CentralLogWriter,
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the dev subscriber with central JSONL file output.
///
/// If the log file cannot be opened, falls back to stderr only.
pub fn init_dev_subscriber(config: &LogConfig) {
    let log_path = config.log_path.clone().or_else(default_log_path);

    let (json_layer, file_error) = match log_path.as_deref().map(CentralLogWriter::new) {
        Some(Ok(writer)) => (
            Some(JsonLayer::new(
                config.service_name.clone(),
                WriterFactory { writer },
            )),
            None,
        ),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    // Without a file sink, stderr is the only place logs can go
    let stderr_layer = if config.also_stderr || json_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(io::stderr)
                .with_ansi(true),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer.map(|l| l.with_filter(env_filter(&config.default_level))))
        .with(stderr_layer.map(|l| l.with_filter(env_filter(&config.default_level))))
        .try_init()
        .is_ok();

    if !installed {
        return;
    }

    match (&log_path, file_error) {
        (Some(path), None) => {
            tracing::info!(log_path = %path.display(), "observability initialized");
        }
        (Some(path), Some(e)) => {
            tracing::warn!(
                log_path = %path.display(),
                error = %e,
                "could not open log file, logging to stderr only"
            );
        }
        (None, _) => {
            tracing::warn!("no home directory, logging to stderr only");
        }
    }
}
