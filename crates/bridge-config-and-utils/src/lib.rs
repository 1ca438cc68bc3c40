//! Configuration, paths, and shared utilities for the SmartLocker bridge.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    AuthorityConfig, Config, OfflinePolicy, SessionConfig, TransportConfig, DEFAULT_DEVICE_PATH,
    DEFAULT_LOG_LEVEL, DEFAULT_WEBHOOK_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
