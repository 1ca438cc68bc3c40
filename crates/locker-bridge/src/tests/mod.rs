//! Integration tests for the bridge.
//!
//! - `harness.rs`          - Mock authority, in-memory transport, mock webhook
//! - `session.rs`          - Framing, replies, and state over a live session
//! - `transport_failure.rs` - Disconnects, open failures, reconnects, shutdown
//! - `scenarios.rs`        - End-to-end runs against the HTTP webhook client

mod scenarios;
