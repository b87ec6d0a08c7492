//! A simulated Live remote script.
//!
//! [`FakePeer`] binds a UDP socket on localhost, receives what the code under
//! test sends, and can answer on the correlator's listener address the way
//! Live does (to a fixed port, not back to the request's source).

use std::net::SocketAddr;
use std::time::Duration;

use livelink_core::osc::{OscMessage, decode_packet, encode_message};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// How long [`FakePeer::recv`] waits before failing the test.
const RECV_DEADLINE: Duration = Duration::from_secs(2);

pub struct FakePeer {
    socket: UdpSocket,
}

impl FakePeer {
    /// Bind on an ephemeral localhost port.
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake peer");
        Self { socket }
    }

    /// Where the code under test should send to.
    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("fake peer has no address")
    }

    /// Receive the next message, panicking if none arrives in time.
    pub async fn recv(&self) -> OscMessage {
        self.try_recv(RECV_DEADLINE)
            .await
            .expect("fake peer received nothing")
    }

    /// Receive the next message within `within`, or `None`.
    pub async fn try_recv(&self, within: Duration) -> Option<OscMessage> {
        let mut buf = vec![0u8; 65_536];
        let (len, _) = tokio::time::timeout(within, self.socket.recv_from(&mut buf))
            .await
            .ok()?
            .expect("fake peer receive failed");
        let mut messages = decode_packet(&buf[..len]).expect("fake peer got invalid OSC");
        Some(messages.remove(0))
    }

    /// Send `msg` to `to`.
    pub async fn send_to(&self, to: SocketAddr, msg: &OscMessage) {
        let bytes = encode_message(msg).expect("fake peer failed to encode");
        self.socket
            .send_to(&bytes, to)
            .await
            .expect("fake peer send failed");
    }

    /// Send raw bytes to `to`.
    pub async fn send_raw(&self, to: SocketAddr, bytes: &[u8]) {
        self.socket
            .send_to(bytes, to)
            .await
            .expect("fake peer send failed");
    }

    /// Answer every request on a background task.
    ///
    /// For each received message `answer` returns the replies to send to
    /// `reply_to`, each after `delay`.
    pub fn serve<F>(self, reply_to: SocketAddr, delay: Duration, answer: F) -> JoinHandle<()>
    where
        F: Fn(&OscMessage) -> Vec<OscMessage> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(request) = self.try_recv(Duration::from_secs(30)).await {
                for reply in answer(&request) {
                    tokio::time::sleep(delay).await;
                    self.send_to(reply_to, &reply).await;
                }
            }
        })
    }
}
