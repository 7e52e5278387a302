//! Integration tests for the six concrete scenarios the media engine is
//! expected to handle end to end: loopback offer/answer, no common codec,
//! DTMF digits, idle eviction, invalid SDP and port exhaustion.

use media_session::{
    Direction, Error, ErrorKind, EventHandler, ManagerConfig, NegotiationState, NotFoundKind,
    PortRange, SessionManager,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config(min: u16, max: u16) -> ManagerConfig {
    ManagerConfig {
        host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        port_range: PortRange::new(min, max).unwrap(),
        ..ManagerConfig::default()
    }
}

#[derive(Default)]
struct CountingEventHandler {
    session_errors: AtomicUsize,
    session_closed: AtomicUsize,
}

impl EventHandler for CountingEventHandler {
    fn on_session_error(&self, _session_id: &str, _error: &ErrorKind) {
        self.session_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_closed(&self, _session_id: &str) {
        self.session_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scenario 1: loopback offer/answer over PCMU, 5 audio frames.
#[tokio::test]
async fn loopback_offer_answer_pcmu_five_frames() {
    let caller = SessionManager::new(config(15000, 15020), Arc::new(media_session::NullEventHandler));
    let callee = SessionManager::new(config(15100, 15120), Arc::new(media_session::NullEventHandler));

    let caller_session = caller.create_session("call-1", Direction::SendRecv).await.unwrap();
    let callee_session = callee.create_session("call-1", Direction::SendRecv).await.unwrap();

    let offer = caller.create_offer("call-1", Direction::SendRecv).await.unwrap();
    assert_eq!(offer.media_descriptions[0].media.port, 15000);
    assert_eq!(offer.media_descriptions[0].media.fmts[..2], [0, 8]);
    assert_eq!(offer.media_descriptions[0].ptime, Some(20));

    let answer = callee.create_answer("call-1", offer).await.unwrap();
    assert_eq!(answer.media_descriptions[0].media.port, 15100);
    assert_eq!(answer.media_descriptions[0].media.fmts[0], 0);

    caller.update_session("call-1", answer).await.unwrap();

    assert_eq!(caller_session.statistics().await.audio_packets_sent, 0);

    caller_session.start().unwrap();
    callee_session.start().unwrap();

    for _ in 0..5 {
        caller_session.send_audio_raw(&[0x7Fu8; 160]).await.unwrap();
        callee_session.send_audio_raw(&[0x7Fu8; 160]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    let caller_stats = caller_session.statistics().await;
    let callee_stats = callee_session.statistics().await;
    assert_eq!(caller_stats.audio_packets_sent, 5);
    assert_eq!(callee_stats.audio_packets_sent, 5);
    // Each side is also the other's receiver: the jitter buffer's target
    // delay (60 ms default) plus the drain tick must still clear all 5
    // frames within the 200 ms window above.
    assert_eq!(caller_stats.audio_packets_received, 5);
    assert_eq!(callee_stats.audio_packets_received, 5);

    caller.stop_all().await;
    callee.stop_all().await;
}

/// Scenario 2: no codec in common fails the answerer and reports exactly
/// one session error.
#[tokio::test]
async fn no_common_codec_fails_answer_and_reports_error_once() {
    let handler = Arc::new(CountingEventHandler::default());
    let mut caller_config = config(15200, 15220);
    caller_config.codec_names = vec!["G729"];
    let caller = SessionManager::new(caller_config, Arc::new(media_session::NullEventHandler));

    let mut callee_config = config(15300, 15320);
    callee_config.codec_names = vec!["PCMU"];
    let callee = SessionManager::new(callee_config, handler.clone());

    caller.create_session("call-2", Direction::SendRecv).await.unwrap();
    callee.create_session("call-2", Direction::SendRecv).await.unwrap();

    let offer = caller.create_offer("call-2", Direction::SendRecv).await.unwrap();

    let err = callee.create_answer("call-2", offer).await.unwrap_err();
    assert!(matches!(err, Error { kind: ErrorKind::NoCommonCodec, .. }));
    assert_eq!(handler.session_errors.load(Ordering::SeqCst), 1);
    assert_eq!(
        callee.negotiation_state("call-2").await.unwrap(),
        NegotiationState::Failed
    );

    caller.stop_all().await;
    callee.stop_all().await;
}

/// Scenario 3: three DTMF digits in sequence are each surfaced once, in
/// order, via the session's statistics counters.
#[tokio::test]
async fn dtmf_digits_are_sent_in_sequence() {
    let caller = SessionManager::new(config(15400, 15420), Arc::new(media_session::NullEventHandler));
    let callee = SessionManager::new(config(15500, 15520), Arc::new(media_session::NullEventHandler));

    let caller_session = caller.create_session("call-3", Direction::SendRecv).await.unwrap();
    let callee_session = callee.create_session("call-3", Direction::SendRecv).await.unwrap();

    let offer = caller.create_offer("call-3", Direction::SendRecv).await.unwrap();
    let answer = callee.create_answer("call-3", offer).await.unwrap();
    caller.update_session("call-3", answer).await.unwrap();

    caller_session.start().unwrap();
    callee_session.start().unwrap();

    for digit in ['1', '2', '3'] {
        caller_session.send_dtmf(digit, 200).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(caller_session.statistics().await.dtmf_events_sent, 3);
    assert_eq!(callee_session.statistics().await.dtmf_events_received, 3);

    caller.stop_all().await;
    callee.stop_all().await;
}

/// Scenario 4: a session with no traffic is evicted once `session_timeout`
/// has elapsed, well within `session_timeout + a couple of cleanup ticks`.
#[tokio::test]
async fn idle_session_is_evicted() {
    let handler = Arc::new(CountingEventHandler::default());
    let mut cfg = config(15600, 15620);
    cfg.session_timeout = Duration::from_millis(300);
    cfg.cleanup_interval = Duration::from_millis(100);
    let manager = SessionManager::new(cfg, handler.clone());

    manager.create_session("idle-1", Direction::SendRecv).await.unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(handler.session_closed.load(Ordering::SeqCst), 1);
    assert!(!manager.list_sessions().await.contains(&"idle-1".to_owned()));
    assert!(matches!(
        manager.get_session("idle-1").await,
        Err(Error { kind: ErrorKind::NotFound(NotFoundKind::Session), .. })
    ));

    manager.stop_all().await;
}

/// Scenario 5: malformed SDP is rejected up front; no session or port
/// leaks behind it.
#[tokio::test]
async fn invalid_sdp_is_rejected_without_leaking_state() {
    let manager = SessionManager::new(config(15700, 15720), Arc::new(media_session::NullEventHandler));

    let err = manager
        .create_session_from_sdp("bad-1", Direction::SendRecv, "v=0\no=invalid sdp\nthis is not valid")
        .await
        .unwrap_err();
    assert!(matches!(err, Error { kind: ErrorKind::SdpParse(_), .. }));

    assert!(manager.list_sessions().await.is_empty());
    assert!(manager.used_ports().is_empty());

    manager.stop_all().await;
}

/// Scenario 6: a range exactly two pairs wide exhausts on the third
/// concurrent session, then recovers a pair once one is closed.
#[tokio::test]
async fn port_exhaustion_recovers_after_close() {
    let mut cfg = config(1100, 1200); // placeholder, overwritten below
    cfg.port_range = PortRange {
        min: 20000,
        max: 20004,
    };
    cfg.max_sessions = 10; // capacity isn't the limiting factor here, ports are
    let manager = SessionManager::new(cfg, Arc::new(media_session::NullEventHandler));

    manager.create_session("p1", Direction::SendRecv).await.unwrap();
    manager.create_session("p2", Direction::SendRecv).await.unwrap();

    assert!(matches!(
        manager.create_session("p3", Direction::SendRecv).await,
        Err(Error { kind: ErrorKind::PortExhausted, .. })
    ));

    manager.close_session("p1").await.unwrap();
    manager.create_session("p4", Direction::SendRecv).await.unwrap();

    manager.stop_all().await;
}

/// `stop_all -> stop_all` is idempotent.
#[tokio::test]
async fn stop_all_is_idempotent() {
    let manager = SessionManager::new(config(15800, 15820), Arc::new(media_session::NullEventHandler));
    manager.create_session("x", Direction::SendRecv).await.unwrap();

    manager.stop_all().await;
    manager.stop_all().await;

    assert!(manager.list_sessions().await.is_empty());
}
