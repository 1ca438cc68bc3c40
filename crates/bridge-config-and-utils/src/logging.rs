//! Logging initialization for the bridge.
//!
//! Thin wrapper over the observability crate. Every bridge component logs
//! through `tracing`; this only decides where the lines end up.

use crate::Paths;

/// Initialize the logging system.
///
/// - Structured JSONL output to `<base_dir>/logs/bridge.jsonl`
/// - Log level from RUST_LOG env var or the provided default
/// - Compact copy on stderr for foreground runs
pub fn init_logging(level: &str, paths: Option<&Paths>) {
    observability::init_with_config(observability::LogConfig {
        service_name: "smartlocker-bridge".into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr: true,
    });
}
