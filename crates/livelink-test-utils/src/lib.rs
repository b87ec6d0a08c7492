#![deny(unsafe_code)]

//! Shared test utilities for the livelink workspace.
//!
//! Provides config builders, a simulated Live peer, tracing helpers, and a
//! log capture layer so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! livelink-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod log_capture;
pub mod peer;
pub mod tracing_setup;
