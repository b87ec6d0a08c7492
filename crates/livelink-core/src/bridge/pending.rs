//! The single in-flight request slot.
//!
//! At most one pending request exists. Installing a new one replaces the
//! old one; every request carries a generation id so a replaced request can
//! neither consume nor be woken by its successor's replies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::debug;

use crate::osc::OscArg;

/// The request currently awaiting a response.
#[derive(Debug)]
struct PendingRequest {
    id: u64,
    expected_address: String,
    collected: Vec<OscArg>,
    signal: Arc<Notify>,
}

/// Handle held by the waiting caller.
#[derive(Debug)]
pub(crate) struct Ticket {
    pub id: u64,
    pub signal: Arc<Notify>,
}

/// What the caller finds in the slot after its wait ends.
#[derive(Debug, PartialEq)]
pub(crate) enum Collected {
    /// The request was still installed; these are its arguments.
    Own(Vec<OscArg>),
    /// A newer request replaced this one.
    Replaced,
}

/// Mutex-guarded slot shared between callers and the receive loop.
#[derive(Debug, Default)]
pub(crate) struct PendingSlot {
    inner: Mutex<Option<PendingRequest>>,
    next_id: AtomicU64,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingRequest>> {
        // Poisoning is ignored: the slot only holds plain data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a fresh request expecting replies on `expected_address`.
    ///
    /// Any request already installed is replaced and woken so its caller
    /// returns immediately.
    pub fn install(&self, expected_address: &str) -> Ticket {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let signal = Arc::new(Notify::new());

        let previous = self.lock().replace(PendingRequest {
            id,
            expected_address: expected_address.to_string(),
            collected: Vec::new(),
            signal: Arc::clone(&signal),
        });

        if let Some(previous) = previous {
            debug!(
                replaced = %previous.expected_address,
                by = %expected_address,
                "pending request replaced before completion"
            );
            previous.signal.notify_one();
        }

        Ticket { id, signal }
    }

    /// Record a reply if `address` is the pending request's key.
    ///
    /// Returns `true` when the reply was accepted. Every accepted reply wakes
    /// the waiter; the append and the wake happen under the same lock as
    /// [`install`](Self::install).
    pub fn deliver(&self, address: &str, args: &[OscArg]) -> bool {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(pending) if pending.expected_address == address => {
                pending.collected.extend_from_slice(args);
                pending.signal.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Remove request `id` from the slot and hand back what it collected.
    pub fn finish(&self, id: u64) -> Collected {
        let mut guard = self.lock();
        match guard.as_ref() {
            Some(pending) if pending.id == id => {
                let pending = guard.take().map(|p| p.collected).unwrap_or_default();
                Collected::Own(pending)
            }
            _ => Collected::Replaced,
        }
    }

    /// The address the installed request is waiting on, if any.
    #[cfg(test)]
    pub fn expected_address(&self) -> Option<String> {
        self.lock().as_ref().map(|p| p.expected_address.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_deliver_matches_only_expected_address() {
        let slot = PendingSlot::new();
        let ticket = slot.install("/live/tempo");

        assert!(!slot.deliver("/live/volume", &[OscArg::Float(0.5)]));
        assert!(slot.deliver("/live/tempo", &[OscArg::Float(120.0)]));

        assert_eq!(
            slot.finish(ticket.id),
            Collected::Own(vec![OscArg::Float(120.0)])
        );
        assert_eq!(slot.expected_address(), None);
    }

    #[test]
    fn test_deliver_without_pending_request() {
        let slot = PendingSlot::new();
        assert!(!slot.deliver("/live/tempo", &[]));
    }

    #[test]
    fn test_fragments_accumulate_in_order() {
        let slot = PendingSlot::new();
        let ticket = slot.install("/live/name/track");

        slot.deliver("/live/name/track", &[OscArg::Int(0), OscArg::from("Drums")]);
        slot.deliver("/live/name/track", &[OscArg::Int(1), OscArg::from("Bass")]);

        assert_eq!(
            slot.finish(ticket.id),
            Collected::Own(vec![
                OscArg::Int(0),
                OscArg::from("Drums"),
                OscArg::Int(1),
                OscArg::from("Bass"),
            ])
        );
    }

    #[test]
    fn test_replaced_request_sees_nothing() {
        let slot = PendingSlot::new();
        let first = slot.install("/a");
        let second = slot.install("/a");
        assert_ne!(first.id, second.id);

        slot.deliver("/a", &[OscArg::Int(2)]);

        assert_eq!(slot.finish(first.id), Collected::Replaced);
        assert_eq!(
            slot.finish(second.id),
            Collected::Own(vec![OscArg::Int(2)])
        );
    }

    #[test]
    fn test_finish_twice_reports_replaced() {
        let slot = PendingSlot::new();
        let ticket = slot.install("/a");
        assert_eq!(slot.finish(ticket.id), Collected::Own(vec![]));
        assert_eq!(slot.finish(ticket.id), Collected::Replaced);
    }

    #[tokio::test]
    async fn test_reply_before_wait_is_not_lost() {
        let slot = PendingSlot::new();
        let ticket = slot.install("/ping");
        slot.deliver("/ping", &[OscArg::Int(1)]);

        // The permit stored by notify_one is consumed by the later wait.
        tokio::time::timeout(Duration::from_millis(100), ticket.signal.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_replacing_wakes_previous_waiter() {
        let slot = PendingSlot::new();
        let first = slot.install("/a");
        let _second = slot.install("/b");

        tokio::time::timeout(Duration::from_millis(100), first.signal.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_signal_does_not_wake_new_request() {
        let slot = PendingSlot::new();
        let first = slot.install("/a");
        slot.deliver("/a", &[OscArg::Int(1)]);
        let _ = slot.finish(first.id);

        let second = slot.install("/a");
        let woke = tokio::time::timeout(Duration::from_millis(50), second.signal.notified()).await;
        assert!(woke.is_err());
    }
}
