//! Turns fire-and-forget OSC sends into requests with a bounded wait.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use livelink_config::AppConfig;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::BridgeError;
use super::dispatcher::{BeatCallback, BeatHook, Dispatcher};
use super::listener::{Listener, LoopExit};
use super::pending::{Collected, PendingSlot};
use crate::osc::{OscArg, OscMessage, encode_message};

/// Default time a request waits for its response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default address of the beat notification.
pub const DEFAULT_BEAT_ADDRESS: &str = "/live/beat";

/// Resolved addresses and tuning for a [`Correlator`].
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub remote: SocketAddr,
    pub listen: SocketAddr,
    pub timeout: Duration,
    pub beat_address: String,
    pub max_receive_errors: u32,
}

impl BridgeSettings {
    /// Settings with default timeout and beat address.
    pub fn new(remote: SocketAddr, listen: SocketAddr) -> Self {
        Self {
            remote,
            listen,
            timeout: DEFAULT_TIMEOUT,
            beat_address: DEFAULT_BEAT_ADDRESS.to_string(),
            max_receive_errors: 8,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_beat_address(mut self, address: impl Into<String>) -> Self {
        self.beat_address = address.into();
        self
    }

    /// Resolve the hosts named in `config`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BridgeError> {
        let remote = resolve(&config.remote.host, config.remote.port).await?;
        let listen = resolve(&config.listener.host, config.listener.port).await?;
        Ok(Self {
            remote,
            listen,
            timeout: config.query.timeout(),
            beat_address: config.query.beat_address.clone(),
            max_receive_errors: config.listener.max_receive_errors,
        })
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, BridgeError> {
    let resolve_err = |source| BridgeError::Resolve {
        host: host.to_string(),
        source,
    };
    tokio::net::lookup_host((host, port))
        .await
        .map_err(resolve_err)?
        .next()
        .ok_or_else(|| resolve_err(io::Error::new(io::ErrorKind::NotFound, "no addresses")))
}

/// A request: the message to send plus the address its reply arrives on.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub message: OscMessage,

    /// Reply address when it differs from the request address
    /// (e.g. `/live/device` answering on `/live/deviceall`).
    pub response_address: Option<String>,
}

impl Query {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            message: OscMessage::new(address),
            response_address: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.message = self.message.arg(arg);
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OscArg>,
    {
        self.message = self.message.args(args);
        self
    }

    /// Wait for the reply on `address` instead of the request address.
    pub fn respond_on(mut self, address: impl Into<String>) -> Self {
        self.response_address = Some(address.into());
        self
    }

    /// The correlation key this request waits on.
    pub fn expected_address(&self) -> &str {
        self.response_address
            .as_deref()
            .unwrap_or(&self.message.address)
    }
}

impl From<&str> for Query {
    fn from(address: &str) -> Self {
        Query::new(address)
    }
}

impl From<OscMessage> for Query {
    fn from(message: OscMessage) -> Self {
        Self {
            message,
            response_address: None,
        }
    }
}

/// How a request's wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// At least one reply arrived.
    Answered,
    /// The timeout elapsed; values are whatever arrived before it.
    TimedOut,
    /// A newer request took the slot; values are empty.
    Superseded,
}

/// Result of [`Correlator::request_detailed`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub values: Vec<OscArg>,
    pub completion: Completion,
}

/// Sends OSC messages to the remote application and matches its replies.
///
/// Only one request may be in flight. A request issued while another is
/// still waiting replaces it; callers on several tasks must serialize their
/// requests themselves.
pub struct Correlator {
    settings: BridgeSettings,
    socket: UdpSocket,
    pending: Arc<PendingSlot>,
    beat: Arc<BeatHook>,
    dispatcher: Dispatcher,
    listener: Mutex<Option<Listener>>,
}

impl Correlator {
    /// Open the outbound socket. Listening starts on first use or on
    /// [`start`](Self::start).
    pub async fn new(settings: BridgeSettings) -> Result<Self, BridgeError> {
        let local: SocketAddr = if settings.remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: local,
                source,
            })?;

        let pending = Arc::new(PendingSlot::new());
        let beat = Arc::new(BeatHook::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&pending),
            Arc::clone(&beat),
            &settings.beat_address,
        );

        debug!(remote = %settings.remote, listen = %settings.listen, "correlator created");

        Ok(Self {
            settings,
            socket,
            pending,
            beat,
            dispatcher,
            listener: Mutex::new(None),
        })
    }

    /// Build a correlator from loaded configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BridgeError> {
        Self::new(BridgeSettings::from_config(config).await?).await
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.settings.remote
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Bind the listener and start the receive loop, if not already running.
    ///
    /// A bind failure is logged as a warning and returned; the correlator
    /// stays usable for sends. A receive loop that stopped on its own is
    /// replaced.
    pub async fn start(&self) -> Result<SocketAddr, BridgeError> {
        let mut slot = self.listener.lock().await;

        if let Some(listener) = slot.as_ref() {
            if !listener.is_finished() {
                return Ok(listener.local_addr());
            }
        }
        if let Some(stale) = slot.take() {
            if let LoopExit::Faulted(e) = stale.shutdown().await {
                warn!(error = %e, "receive loop had stopped, restarting it");
            }
        }

        match Listener::bind(
            self.settings.listen,
            self.dispatcher.clone(),
            self.settings.max_receive_errors,
        )
        .await
        {
            Ok(listener) => {
                let addr = listener.local_addr();
                *slot = Some(listener);
                Ok(addr)
            }
            Err(source) => {
                warn!(
                    addr = %self.settings.listen,
                    error = %source,
                    "listen failed, replies will not be received"
                );
                Err(BridgeError::Bind {
                    addr: self.settings.listen,
                    source,
                })
            }
        }
    }

    /// Stop the receive loop and close the listener. No-op when not listening.
    pub async fn stop(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            let addr = listener.local_addr();
            if let LoopExit::Faulted(e) = listener.shutdown().await {
                warn!(addr = %addr, error = %e, "receive loop had failed before stop");
            }
            info!(addr = %addr, "stopped listening");
        }
    }

    pub async fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .await
            .as_ref()
            .is_some_and(|l| !l.is_finished())
    }

    /// Address the listener is bound to, while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .await
            .as_ref()
            .filter(|l| !l.is_finished())
            .map(Listener::local_addr)
    }

    /// Invoke `callback` on every beat notification, replacing any previous one.
    pub fn register_beat_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: BeatCallback = Arc::new(callback);
        self.beat.set(Some(callback));
    }

    pub fn clear_beat_callback(&self) {
        self.beat.set(None);
    }

    async fn ensure_listening(&self) {
        // Failure is already logged by `start`; sends go out regardless.
        let _ = self.start().await;
    }

    /// Send a message without waiting for any reply.
    pub async fn send(&self, message: impl Into<OscMessage>) -> Result<(), BridgeError> {
        self.ensure_listening().await;
        let message = message.into();
        let payload = encode_message(&message)?;
        self.transmit(&payload).await?;
        debug!(address = %message.address, args = message.args.len(), "message sent");
        Ok(())
    }

    /// Send a request and wait for its reply, reporting how the wait ended.
    pub async fn request_detailed(
        &self,
        query: impl Into<Query>,
    ) -> Result<QueryOutcome, BridgeError> {
        let query = query.into();
        self.ensure_listening().await;

        let payload = encode_message(&query.message)?;
        let expected = query.expected_address().to_string();
        let ticket = self.pending.install(&expected);

        if let Err(e) = self.transmit(&payload).await {
            let _ = self.pending.finish(ticket.id);
            return Err(e);
        }

        let woke = tokio::time::timeout(self.settings.timeout, ticket.signal.notified())
            .await
            .is_ok();

        let outcome = match self.pending.finish(ticket.id) {
            Collected::Replaced => {
                debug!(address = %expected, "request superseded by a newer one");
                QueryOutcome {
                    values: Vec::new(),
                    completion: Completion::Superseded,
                }
            }
            Collected::Own(values) if woke => QueryOutcome {
                values,
                completion: Completion::Answered,
            },
            Collected::Own(values) => {
                warn!(
                    address = %expected,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    partial = values.len(),
                    "timed out waiting for server response"
                );
                QueryOutcome {
                    values,
                    completion: Completion::TimedOut,
                }
            }
        };

        Ok(outcome)
    }

    /// Send a request and return every value collected for it.
    ///
    /// A timeout is not an error: it is logged and the partial (possibly
    /// empty) result is returned.
    pub async fn request(&self, query: impl Into<Query>) -> Result<Vec<OscArg>, BridgeError> {
        Ok(self.request_detailed(query).await?.values)
    }

    /// Send a request and return the first value collected, if any.
    pub async fn request_one(&self, query: impl Into<Query>) -> Result<Option<OscArg>, BridgeError> {
        Ok(self.request(query).await?.into_iter().next())
    }

    async fn transmit(&self, payload: &[u8]) -> Result<(), BridgeError> {
        self.socket
            .send_to(payload, self.settings.remote)
            .await
            .map_err(BridgeError::Transport)?;
        Ok(())
    }
}
