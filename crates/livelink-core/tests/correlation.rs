//! End-to-end correlation tests against a simulated Live peer over UDP.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use livelink_core::bridge::BridgeError;
use livelink_core::osc::{OscArg, OscMessage};
use livelink_core::{Completion, Correlator, Query};
use livelink_test_utils::config::TestConfigBuilder;
use livelink_test_utils::log_capture::LogCapture;
use livelink_test_utils::peer::FakePeer;
use pretty_assertions::assert_eq;
use tracing::Level;

async fn correlator(peer: &FakePeer, timeout_ms: u64) -> Correlator {
    let config = TestConfigBuilder::new()
        .remote(peer.addr())
        .timeout_ms(timeout_ms)
        .build();
    Correlator::from_config(&config).await.unwrap()
}

/// Bundle two messages into one datagram so they are dispatched together.
fn bundle(messages: &[OscMessage]) -> Vec<u8> {
    let mut out = b"#bundle\0".to_vec();
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    for msg in messages {
        let bytes = livelink_core::osc::encode_message(msg).unwrap();
        out.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

#[test_log::test(tokio::test)]
async fn ping_is_answered_before_the_timeout() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 5000).await;
    let listen = c.start().await.unwrap();

    let server = peer.serve(listen, Duration::from_millis(100), |req| {
        assert_eq!(req.address, "/ping");
        vec![OscMessage::new("/ping").arg(1)]
    });

    let started = Instant::now();
    let values = c.request("/ping").await.unwrap();

    assert_eq!(values, vec![OscArg::Int(1)]);
    assert!(started.elapsed() < Duration::from_secs(1));
    server.abort();
}

#[tokio::test]
async fn unknown_address_times_out_after_default_timeout() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 5000).await;

    let started = Instant::now();
    let values = c.request("/unknown").await.unwrap();
    let elapsed = started.elapsed();

    assert!(values.is_empty());
    assert!(elapsed >= Duration::from_secs(5), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5500), "returned late: {elapsed:?}");
    assert!(capture.contains(Level::WARN, "timed out"));

    // The request still reached the peer.
    assert_eq!(peer.recv().await.address, "/unknown");
}

#[tokio::test]
async fn timeout_is_honoured_for_several_durations() {
    let peer = FakePeer::bind().await;
    for ms in [50u64, 150, 300] {
        let c = correlator(&peer, ms).await;
        let timeout = Duration::from_millis(ms);

        let started = Instant::now();
        let outcome = c.request_detailed("/live/nothing").await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.completion, Completion::TimedOut);
        assert!(outcome.values.is_empty());
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(250), "{ms}ms took {elapsed:?}");
        c.stop().await;
    }
}

#[test_log::test(tokio::test)]
async fn response_address_override_ignores_request_address() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 2000).await;
    let listen = c.start().await.unwrap();

    let server = peer.serve(listen, Duration::from_millis(20), |_| {
        vec![
            OscMessage::new("/live/device").arg(99),
            OscMessage::new("/live/deviceall").arg(0).arg("Operator"),
        ]
    });

    let query = Query::new("/live/device").arg(0).respond_on("/live/deviceall");
    let values = c.request(query).await.unwrap();

    assert_eq!(values, vec![OscArg::Int(0), OscArg::from("Operator")]);
    server.abort();
}

/// Fragments in one datagram are dispatched before the waiter resumes.
#[test_log::test(tokio::test)]
async fn fragments_accumulate_in_arrival_order() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 2000).await;
    let listen = c.start().await.unwrap();

    let request = c.request("/live/name/track");
    let respond = async {
        peer.recv().await;
        peer.send_raw(
            listen,
            &bundle(&[
                OscMessage::new("/live/name/track").arg(0).arg("Drums"),
                OscMessage::new("/live/name/track").arg(1).arg("Bass"),
            ]),
        )
        .await;
    };

    let (values, ()) = tokio::join!(request, respond);
    assert_eq!(
        values.unwrap(),
        vec![
            OscArg::Int(0),
            OscArg::from("Drums"),
            OscArg::Int(1),
            OscArg::from("Bass"),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn fragment_in_later_datagram_is_not_collected() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 500).await;
    let listen = c.start().await.unwrap();

    let started = Instant::now();
    let request = c.request_detailed("/live/name/track");
    let respond = async {
        peer.recv().await;
        peer.send_to(listen, &OscMessage::new("/live/name/track").arg(0))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        peer.send_to(listen, &OscMessage::new("/live/name/track").arg(1))
            .await;
    };

    let (outcome, ()) = tokio::join!(request, respond);
    let outcome = outcome.unwrap();

    // The waiter resumes on the first fragment and removes the request.
    assert_eq!(outcome.completion, Completion::Answered);
    assert_eq!(outcome.values, vec![OscArg::Int(0)]);
    assert!(started.elapsed() < Duration::from_millis(400));

    // Let the late fragment be dispatched; it must not leak into the next request.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let next = c.request_detailed(Query::new("/live/name/track").arg(9)).await;
    let next = next.unwrap();
    assert_eq!(next.completion, Completion::TimedOut);
    assert!(next.values.is_empty());
}

#[test_log::test(tokio::test)]
async fn beats_invoke_callback_while_request_pending() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 2000).await;
    let listen = c.start().await.unwrap();

    let beats = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&beats);
    c.register_beat_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let server = peer.serve(listen, Duration::from_millis(10), |_| {
        vec![
            OscMessage::new("/live/beat").arg(1),
            OscMessage::new("/live/beat").arg(2),
            OscMessage::new("/live/beat").arg(3),
            OscMessage::new("/live/tempo").arg(120.0f32),
        ]
    });

    let outcome = c.request_detailed("/live/tempo").await.unwrap();
    assert_eq!(outcome.completion, Completion::Answered);
    assert_eq!(outcome.values, vec![OscArg::Float(120.0)]);
    assert_eq!(beats.load(Ordering::SeqCst), 3);
    server.abort();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 100).await;

    c.stop().await;
    c.start().await.unwrap();
    assert!(c.is_listening().await);
    c.stop().await;
    c.stop().await;
    assert!(!c.is_listening().await);
}

#[test_log::test(tokio::test)]
async fn newer_request_supersedes_older_one() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 1000).await;
    let listen = c.start().await.unwrap();

    let server = peer.serve(listen, Duration::from_millis(50), |req| {
        if req.address == "/b" {
            vec![OscMessage::new("/b").arg(2)]
        } else {
            vec![]
        }
    });

    let first = c.request_detailed("/a");
    let second = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        c.request_detailed("/b").await
    };
    let (first, second) = tokio::join!(first, second);

    let first = first.unwrap();
    assert_eq!(first.completion, Completion::Superseded);
    assert!(first.values.is_empty());

    let second = second.unwrap();
    assert_eq!(second.completion, Completion::Answered);
    assert_eq!(second.values, vec![OscArg::Int(2)]);
    server.abort();
}

#[test_log::test(tokio::test)]
async fn correlation_works_again_after_restart() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 1000).await;

    c.start().await.unwrap();
    c.stop().await;
    let listen = c.start().await.unwrap();

    let server = peer.serve(listen, Duration::from_millis(10), |req| {
        vec![OscMessage::new(req.address.clone()).arg("ok")]
    });

    assert_eq!(
        c.request_one("/live/tempo").await.unwrap(),
        Some(OscArg::from("ok"))
    );
    server.abort();
}

#[tokio::test]
async fn bind_failure_is_not_fatal() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let peer = FakePeer::bind().await;
    let occupied = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = TestConfigBuilder::new()
        .remote(peer.addr())
        .listen_port(occupied.local_addr().unwrap().port())
        .timeout_ms(100)
        .build();
    let c = Correlator::from_config(&config).await.unwrap();

    assert!(matches!(c.start().await, Err(BridgeError::Bind { .. })));
    assert!(!c.is_listening().await);
    assert!(capture.contains(Level::WARN, "listen failed"));

    c.send(OscMessage::new("/live/play")).await.unwrap();
    assert_eq!(peer.recv().await.address, "/live/play");

    let outcome = c.request_detailed("/live/tempo").await.unwrap();
    assert_eq!(outcome.completion, Completion::TimedOut);
}

#[test_log::test(tokio::test)]
async fn garbage_datagrams_are_dropped() {
    let peer = FakePeer::bind().await;
    let c = correlator(&peer, 2000).await;
    let listen = c.start().await.unwrap();

    let request = c.request("/live/tempo");
    let respond = async {
        peer.recv().await;
        peer.send_raw(listen, b"\xff\xfe garbage").await;
        peer.send_to(listen, &OscMessage::new("/live/tempo").arg(98.5f32))
            .await;
    };

    let (values, ()) = tokio::join!(request, respond);
    assert_eq!(values.unwrap(), vec![OscArg::Float(98.5)]);
    assert!(c.is_listening().await);
}
