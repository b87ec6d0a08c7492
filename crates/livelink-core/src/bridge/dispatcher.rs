//! Inbound message routing.
//!
//! Every decoded message is either a reply to the pending request, a beat
//! notification, or dropped. Nothing else is recognised.

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::trace;

use super::pending::PendingSlot;
use crate::osc::InboundMessage;

/// Callback invoked on every beat notification.
pub type BeatCallback = Arc<dyn Fn() + Send + Sync>;

/// Holder for the optional beat callback.
#[derive(Default)]
pub(crate) struct BeatHook {
    callback: RwLock<Option<BeatCallback>>,
}

impl BeatHook {
    pub fn set(&self, callback: Option<BeatCallback>) {
        *self.callback.write().unwrap_or_else(|e| e.into_inner()) = callback;
    }

    pub fn get(&self) -> Option<BeatCallback> {
        self.callback
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl fmt::Debug for BeatHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeatHook")
            .field("registered", &self.get().is_some())
            .finish()
    }
}

/// How a message was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Appended to the pending request and woke its caller.
    Response,
    /// Matched the beat address. The callback ran if one is registered.
    Beat,
    /// Neither; dropped.
    Ignored,
}

/// Classifies inbound messages. Runs on the receive task.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    pending: Arc<PendingSlot>,
    beat: Arc<BeatHook>,
    beat_address: Arc<str>,
}

impl Dispatcher {
    pub(crate) fn new(pending: Arc<PendingSlot>, beat: Arc<BeatHook>, beat_address: &str) -> Self {
        Self {
            pending,
            beat,
            beat_address: Arc::from(beat_address),
        }
    }

    /// Route one message.
    ///
    /// A pending reply takes precedence over the beat address. The beat
    /// payload is not passed to the callback.
    pub fn dispatch(&self, msg: &InboundMessage) -> Routed {
        if self.pending.deliver(&msg.address, &msg.args) {
            trace!(address = %msg.address, args = msg.args.len(), "reply collected");
            return Routed::Response;
        }

        if msg.address == *self.beat_address {
            if let Some(callback) = self.beat.get() {
                callback();
            }
            return Routed::Beat;
        }

        trace!(address = %msg.address, source = %msg.source, "ignoring message");
        Routed::Ignored
    }
}
