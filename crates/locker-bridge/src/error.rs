//! Error types for the bridge.

use thiserror::Error;

/// Bridge error type.
///
/// None of these reach the locker; the wire only ever carries a verdict.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Transport I/O (device node, socket)
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authority error: {0}")]
    Authority(#[from] authority_client::AuthorityError),

    #[error(transparent)]
    Core(#[from] bridge_config_and_utils::CoreError),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
