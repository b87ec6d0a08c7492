//! Request/response correlation over OSC.
//!
//! Live's remote script answers a request by sending a message back to a
//! fixed local port, not to the socket the request came from. The
//! [`Correlator`] sends requests, keeps a single pending request, and waits
//! with a timeout for a reply that the receive loop matches by address.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   send (UDP)    ┌──────────────┐
//! │ Correlator │────────────────▶│  Live remote │
//! │  request() │                 │    script    │
//! └─────▲──────┘                 └──────┬───────┘
//!       │ wake                          │ reply / beat (UDP)
//! ┌─────┴──────┐   dispatch      ┌──────▼───────┐
//! │  Pending   │◀────────────────│ receive loop │
//! │   slot     │   beat callback │  (listener)  │
//! └────────────┘                 └──────────────┘
//! ```

pub mod correlator;
pub mod dispatcher;
pub(crate) mod listener;
pub(crate) mod pending;

use std::io;
use std::net::SocketAddr;

use crate::osc::CodecError;

pub use correlator::{
    BridgeSettings, Completion, Correlator, DEFAULT_BEAT_ADDRESS, DEFAULT_TIMEOUT, Query,
    QueryOutcome,
};
pub use dispatcher::BeatCallback;

/// Errors from the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("couldn't bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to resolve host {host:?}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("send failed: {0}")]
    Transport(io::Error),

    #[error("failed to encode message: {0}")]
    Codec(#[from] CodecError),
}
