#![deny(unsafe_code)]

//! livelink core: talk to Ableton Live over OSC.
//!
//! Provides the OSC codec and the [`Correlator`], which sends control
//! messages to Live's remote script and turns its out-of-band replies into
//! request results. Beat notifications from Live are delivered to a
//! registered callback.

/// Request/response correlation, inbound dispatch, and the receive loop.
pub mod bridge;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// OSC message types and wire codec.
pub mod osc;

pub use bridge::{BridgeError, BridgeSettings, Completion, Correlator, Query, QueryOutcome};
pub use osc::{OscArg, OscMessage};
