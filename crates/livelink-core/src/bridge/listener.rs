//! Background receive loop.
//!
//! One tokio task reads datagrams, decodes them, and hands each message to
//! the [`Dispatcher`] inline, so dispatch never runs concurrently with
//! itself. The task exits on shutdown, when its [`Listener`] is dropped, or
//! after too many consecutive receive failures.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::dispatcher::Dispatcher;
use crate::osc::{InboundMessage, decode_packet};

/// Largest datagram the loop will read.
const MAX_DATAGRAM: usize = 65_536;

/// Pause between retries after a failed receive.
const RETRY_PAUSE: Duration = Duration::from_millis(10);

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub(crate) struct ShutdownSignal;

/// Why the receive loop ended.
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// Asked to stop, or the owning [`Listener`] went away.
    Shutdown,
    /// Gave up after consecutive receive failures; holds the last one.
    Faulted(io::Error),
}

/// Anything the receive loop can read datagrams from.
pub(crate) trait DatagramSource: Send + Sync + 'static {
    fn recv_datagram(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

impl DatagramSource for UdpSocket {
    fn recv_datagram(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send {
        self.recv_from(buf)
    }
}

/// A running receive loop and the means to stop it.
#[derive(Debug)]
pub(crate) struct Listener {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    task: JoinHandle<LoopExit>,
}

impl Listener {
    /// Bind a UDP socket on `addr` and start receiving on it.
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher, max_errors: u32) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "started listening");
        Ok(Self::spawn(socket, local_addr, dispatcher, max_errors))
    }

    /// Start the receive loop over an already-open source.
    pub fn spawn<S: DatagramSource>(
        source: S,
        local_addr: SocketAddr,
        dispatcher: Dispatcher,
        max_errors: u32,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(receive_loop(source, dispatcher, shutdown_rx, max_errors));
        Self {
            local_addr,
            shutdown_tx,
            task,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the loop has already exited on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit. The socket is closed when the
    /// task drops it.
    pub async fn shutdown(self) -> LoopExit {
        let _ = self.shutdown_tx.send(ShutdownSignal);
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "receive task did not exit cleanly");
                LoopExit::Shutdown
            }
        }
    }
}

async fn receive_loop<S: DatagramSource>(
    source: S,
    dispatcher: Dispatcher,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
    max_errors: u32,
) -> LoopExit {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut consecutive_errors = 0u32;

    loop {
        let received = tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("receive loop stopping");
                return LoopExit::Shutdown;
            }
            r = source.recv_datagram(&mut buf) => r,
        };

        match received {
            Ok((len, source_addr)) => {
                consecutive_errors = 0;
                handle_datagram(&dispatcher, &buf[..len], source_addr);
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= max_errors {
                    error!(error = %e, failures = consecutive_errors, "receive loop giving up");
                    return LoopExit::Faulted(e);
                }
                warn!(error = %e, failures = consecutive_errors, "receive failed, retrying");
                tokio::time::sleep(RETRY_PAUSE).await;
            }
        }
    }
}

fn handle_datagram(dispatcher: &Dispatcher, data: &[u8], source: SocketAddr) {
    match decode_packet(data) {
        Ok(messages) => {
            for message in messages {
                let inbound = InboundMessage::from_message(message, source);
                let routed = dispatcher.dispatch(&inbound);
                trace!(address = %inbound.address, ?routed, "dispatched");
            }
        }
        Err(e) => {
            debug!(%source, error = %e, len = data.len(), "dropping undecodable datagram");
        }
    }
}
