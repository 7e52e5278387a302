use crate::codec;
use crate::direction::Direction;
use crate::error::{Error, ErrorKind};
use crate::rtp_stream::RtpStream;
use crate::statistics::Statistics;
use crate::transport::Transport;
use bytes::Bytes;
use media_rtp::{
    DtmfCoder, DtmfConfig, DtmfEvent, DtmfSender, JitterBuffer, JitterBufferConfig,
    ReceptionReportInput, RtcpReport, RtcpReporter, SenderInfo,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// `Idle → Active → {Paused ↔ Active} → Closed`, plus `Idle → Closed`.
/// Terminal: `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSessionState {
    Idle,
    Active,
    Paused,
    Closed,
}

/// Fixed configuration a [`MediaSession`] is constructed with. Mutable
/// aspects (direction, payload type, ptime, toggles) live as atomics/fields
/// behind the session's lock and are changed via setters.
#[derive(Debug, Clone)]
pub struct MediaSessionConfig {
    pub session_id: String,
    pub direction: Direction,
    pub payload_type: u8,
    pub clock_rate: u32,
    pub ptime_ms: u32,
    pub jitter_buffer_enabled: bool,
    pub jitter_buffer: JitterBufferConfig,
    pub dtmf_enabled: bool,
    pub dtmf: DtmfConfig,
    pub rtcp_enabled: bool,
    pub rtcp_interval: Duration,
    pub rtcp_cname: String,
    pub silence_suppression: bool,
}

impl Default for MediaSessionConfig {
    fn default() -> Self {
        MediaSessionConfig {
            session_id: String::new(),
            direction: Direction::SendRecv,
            payload_type: codec::PCMU.static_pt.expect("PCMU has a static pt"),
            clock_rate: codec::PCMU.clock_rate,
            ptime_ms: 20,
            jitter_buffer_enabled: true,
            jitter_buffer: JitterBufferConfig::default(),
            dtmf_enabled: true,
            dtmf: DtmfConfig::default(),
            rtcp_enabled: true,
            rtcp_interval: Duration::from_secs(5),
            rtcp_cname: String::new(),
            silence_suppression: false,
        }
    }
}

/// Consumer-supplied sink for one session's media/control events. All
/// methods default to doing nothing, so implementors only override what
/// they use.
pub trait MediaSessionObserver: Send + Sync {
    fn on_audio(&self, _payload: &[u8]) {}
    fn on_dtmf(&self, _event: DtmfEvent) {}
    fn on_rtcp(&self, _report: &RtcpReport) {}
    fn on_error(&self, _error: &ErrorKind) {}
}

/// A no-op observer for sessions that don't need callbacks.
pub struct NullObserver;
impl MediaSessionObserver for NullObserver {}

fn silence_byte_for(payload_type: u8) -> Option<u8> {
    match payload_type {
        0 => Some(0x7F), // PCMU (μ-law)
        8 => Some(0xFF), // PCMA (A-law)
        _ => None,
    }
}

struct Inner {
    rtp_stream: RtpStream,
    jitter_buffer: Option<JitterBuffer>,
    dtmf_coder: DtmfCoder,
    dtmf_sender: Option<DtmfSender>,
    rtcp_reporter: RtcpReporter,
    statistics: Statistics,
    send_accumulator: Vec<u8>,
    frame_bytes: usize,
    sent_since_last_rtcp_tick: bool,
    direction: Direction,
    payload_type: u8,
    ptime_ms: u32,
    silence_suppression: bool,
    rtcp_enabled: bool,
    rtcp_interval: Duration,
}

impl Inner {
    fn frame_samples(clock_rate: u32, ptime_ms: u32) -> u32 {
        clock_rate * ptime_ms / 1000
    }

    fn dispatch_frame(&mut self, payload: Bytes, marker: bool) -> media_rtp::RtpPacket {
        let samples = Self::frame_samples(self.rtp_stream.clock_rate, self.ptime_ms);
        self.statistics.audio_packets_sent += 1;
        self.statistics.audio_bytes_sent += payload.len() as u64;
        self.sent_since_last_rtcp_tick = true;
        self.rtp_stream.next_audio_frame(payload, marker, samples)
    }

    fn is_silence(&self, payload: &[u8]) -> bool {
        self.silence_suppression
            && silence_byte_for(self.payload_type)
                .is_some_and(|silence| payload.iter().all(|&b| b == silence))
    }
}

/// Per-call state machine composing one [`RtpStream`] (audio), jitter
/// buffer, DTMF coder and RTCP reporter.
pub struct MediaSession {
    session_id: String,
    state: AtomicU8,
    transport: Arc<Transport>,
    rtcp_transport: Arc<Transport>,
    inner: Arc<AsyncMutex<Inner>>,
    observer: Arc<dyn MediaSessionObserver>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    rtcp_enabled: bool,
}

const STATE_IDLE: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_PAUSED: u8 = 2;
const STATE_CLOSED: u8 = 3;

fn state_from_u8(v: u8) -> MediaSessionState {
    match v {
        STATE_ACTIVE => MediaSessionState::Active,
        STATE_PAUSED => MediaSessionState::Paused,
        STATE_CLOSED => MediaSessionState::Closed,
        _ => MediaSessionState::Idle,
    }
}

impl MediaSession {
    /// `transport` carries RTP; `rtcp_transport` carries RTCP (pass the same
    /// instance again for rtcp-mux).
    pub fn new(
        config: MediaSessionConfig,
        transport: Arc<Transport>,
        rtcp_transport: Arc<Transport>,
        observer: Arc<dyn MediaSessionObserver>,
    ) -> Self {
        let now = Instant::now();
        let rtp_stream = RtpStream::new(config.payload_type, config.clock_rate);
        let frame_bytes = Inner::frame_samples(config.clock_rate, config.ptime_ms) as usize;

        let inner = Inner {
            jitter_buffer: config
                .jitter_buffer_enabled
                .then(|| JitterBuffer::new(config.jitter_buffer, config.clock_rate)),
            dtmf_coder: DtmfCoder::new(config.dtmf),
            dtmf_sender: None,
            rtcp_reporter: RtcpReporter::new(rtp_stream.ssrc, config.rtcp_cname.clone()),
            statistics: Statistics::new(now),
            send_accumulator: Vec::with_capacity(frame_bytes),
            frame_bytes,
            sent_since_last_rtcp_tick: false,
            direction: config.direction,
            payload_type: config.payload_type,
            ptime_ms: config.ptime_ms,
            silence_suppression: config.silence_suppression,
            rtcp_enabled: config.rtcp_enabled,
            rtcp_interval: config.rtcp_interval,
            rtp_stream,
        };

        MediaSession {
            session_id: config.session_id,
            state: AtomicU8::new(STATE_IDLE),
            transport,
            rtcp_transport,
            inner: Arc::new(AsyncMutex::new(inner)),
            observer,
            tasks: std::sync::Mutex::new(Vec::new()),
            rtcp_enabled: config.rtcp_enabled,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> MediaSessionState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    fn err(&self, kind: ErrorKind) -> Error {
        Error::with_session(self.session_id.clone(), kind)
    }

    /// Transitions to `Active`, starting the send clock, receive loop and
    /// (when enabled) RTCP tick tasks.
    pub fn start(self: &Arc<Self>) -> Result<(), Error> {
        match self.state() {
            MediaSessionState::Active => return Err(self.err(ErrorKind::WrongState("AlreadyStarted"))),
            MediaSessionState::Closed => return Err(self.err(ErrorKind::WrongState("session is closed"))),
            _ => {}
        }

        self.state.store(STATE_ACTIVE, Ordering::Release);

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(self.clone().spawn_send_clock());
        tasks.push(self.clone().spawn_receive_loop());
        tasks.push(self.clone().spawn_jitter_drain_tick());
        if self.rtcp_enabled {
            tasks.push(self.clone().spawn_rtcp_tick());
        }

        Ok(())
    }

    /// Transitions to `Closed`, aborts background tasks, releases the
    /// transports. Idempotent.
    pub async fn stop(&self) {
        if self.state() == MediaSessionState::Closed {
            return;
        }
        self.state.store(STATE_CLOSED, Ordering::Release);

        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        self.transport.close();
        self.rtcp_transport.close();
    }

    pub fn pause(&self) -> Result<(), Error> {
        if self.state() != MediaSessionState::Active {
            return Err(self.err(ErrorKind::WrongState("pause requires Active")));
        }
        self.state.store(STATE_PAUSED, Ordering::Release);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), Error> {
        if self.state() != MediaSessionState::Paused {
            return Err(self.err(ErrorKind::WrongState("resume requires Paused")));
        }
        self.state.store(STATE_ACTIVE, Ordering::Release);
        Ok(())
    }

    /// Appends to the send accumulator; frames are flushed by the send
    /// clock once a full ptime's worth of bytes has accumulated.
    pub async fn send_audio(&self, payload: &[u8]) -> Result<(), Error> {
        self.check_can_send()?;
        let mut inner = self.lock_sendable().await?;
        inner.send_accumulator.extend_from_slice(payload);
        Ok(())
    }

    /// Bypasses the accumulator: sends exactly the given bytes as one frame,
    /// immediately.
    pub async fn send_audio_raw(&self, payload: &[u8]) -> Result<(), Error> {
        self.check_can_send()?;
        let mut inner = self.lock_sendable().await?;

        if inner.is_silence(payload) {
            return Ok(());
        }

        let packet = inner.dispatch_frame(Bytes::copy_from_slice(payload), false);
        drop(inner);

        self.transport
            .send(&packet.to_vec())
            .await
            .map_err(|e| self.err(e))
    }

    /// Forces any partial frame to dispatch now, padded with silence if
    /// shorter than one ptime.
    pub async fn flush_audio_buffer(&self) -> Result<(), Error> {
        self.check_can_send()?;
        let mut inner = self.lock_sendable().await?;

        if inner.send_accumulator.is_empty() {
            return Ok(());
        }

        let frame_bytes = inner.frame_bytes;
        let silence = silence_byte_for(inner.payload_type).unwrap_or(0);
        let mut frame: Vec<u8> = inner.send_accumulator.drain(..).collect();
        frame.resize(frame_bytes, silence);

        let packet = inner.dispatch_frame(Bytes::from(frame), false);
        drop(inner);

        self.transport
            .send(&packet.to_vec())
            .await
            .map_err(|e| self.err(e))
    }

    pub async fn send_dtmf(&self, digit: char, duration_ms: u32) -> Result<(), Error> {
        self.check_can_send()?;
        let mut inner = self.lock_sendable().await?;

        let sender = inner
            .dtmf_coder
            .begin_send(digit, duration_ms, 10)
            .map_err(|e| self.err(ErrorKind::ConfigInvalid(e.to_string())))?;
        inner.dtmf_sender = Some(sender);
        Ok(())
    }

    /// Locks `inner` and checks the stream's current direction permits
    /// sending, returning `Error(WrongDirection)` without mutating anything
    /// otherwise.
    async fn lock_sendable(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>, Error> {
        let inner = self.inner.lock().await;
        if !inner.direction.can_send() {
            return Err(self.err(ErrorKind::WrongDirection(inner.direction)));
        }
        Ok(inner)
    }

    pub async fn statistics(&self) -> Statistics {
        self.inner.lock().await.statistics
    }

    /// Points the RTP/RTCP transports at the peer's negotiated address.
    /// Called once negotiation resolves the remote `c=`/`m=` lines.
    pub fn set_remote(&self, rtp: std::net::SocketAddr, rtcp: std::net::SocketAddr) {
        self.transport.set_remote(rtp);
        self.rtcp_transport.set_remote(rtcp);
    }

    pub async fn set_direction(&self, direction: Direction) -> Result<(), Error> {
        self.check_mutable()?;
        self.inner.lock().await.direction = direction;
        Ok(())
    }

    pub async fn set_payload_type(&self, payload_type: u8) -> Result<(), Error> {
        self.check_mutable()?;
        let mut inner = self.inner.lock().await;
        inner.payload_type = payload_type;
        inner.rtp_stream.payload_type = payload_type;
        Ok(())
    }

    pub async fn set_ptime(&self, ptime_ms: u32) -> Result<(), Error> {
        self.check_mutable()?;
        self.inner.lock().await.ptime_ms = ptime_ms;
        Ok(())
    }

    pub async fn enable_jitter_buffer(&self, enabled: bool, config: JitterBufferConfig) -> Result<(), Error> {
        self.check_mutable()?;
        let mut inner = self.inner.lock().await;
        let clock_rate = inner.rtp_stream.clock_rate;
        inner.jitter_buffer = enabled.then(|| JitterBuffer::new(config, clock_rate));
        Ok(())
    }

    pub async fn enable_silence_suppression(&self, enabled: bool) -> Result<(), Error> {
        self.check_mutable()?;
        self.inner.lock().await.silence_suppression = enabled;
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), Error> {
        match self.state() {
            MediaSessionState::Active | MediaSessionState::Idle => Ok(()),
            _ => Err(self.err(ErrorKind::WrongState("mutator requires Active or Idle"))),
        }
    }

    fn check_can_send(&self) -> Result<(), Error> {
        if self.state() != MediaSessionState::Active {
            return Err(self.err(ErrorKind::WrongState("send requires Active")));
        }
        Ok(())
    }

    fn spawn_send_clock(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let ptime_ms = self.inner.lock().await.ptime_ms;
                tokio::time::sleep(Duration::from_millis(u64::from(ptime_ms))).await;

                if self.state() != MediaSessionState::Active {
                    continue;
                }

                let mut inner = self.inner.lock().await;

                if !inner.direction.can_send() {
                    continue;
                }

                // Pull the sender out of `inner` before touching any other
                // field: a `&mut inner.dtmf_sender` binding held across
                // `inner.dtmf_coder`/`inner.rtp_stream`/`inner.statistics`
                // accesses re-borrows `*inner` through the mutex guard's
                // `DerefMut` each time, which the borrow checker won't
                // split the way it would disjoint fields of a plain
                // `&mut Inner`.
                let mut sender = inner.dtmf_sender.take();
                if let Some(s) = sender.as_mut() {
                    let dtmf_pt = inner.dtmf_coder.config.payload_type;
                    let timestamp = inner.rtp_stream.current_timestamp();
                    if let Some(payload) = s.next_tick() {
                        let finished = s.is_finished();
                        let packet = inner.rtp_stream.next_dtmf_frame(
                            dtmf_pt,
                            Bytes::copy_from_slice(&payload.encode()),
                            false,
                            timestamp,
                        );
                        if finished {
                            inner.statistics.dtmf_events_sent += 1;
                        } else {
                            inner.dtmf_sender = sender;
                        }
                        drop(inner);
                        let _ = self.transport.send(&packet.to_vec()).await;
                        continue;
                    }
                }
                inner.dtmf_sender = sender;

                if inner.send_accumulator.len() >= inner.frame_bytes {
                    let frame_bytes = inner.frame_bytes;
                    let frame: Vec<u8> = inner.send_accumulator.drain(..frame_bytes).collect();

                    if inner.is_silence(&frame) {
                        continue;
                    }

                    let packet = inner.dispatch_frame(Bytes::from(frame), false);
                    drop(inner);
                    let _ = self.transport.send(&packet.to_vec()).await;
                }
            }
        })
    }

    fn spawn_receive_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let received = self.transport.receive(Duration::from_secs(3600)).await;

                match received {
                    Ok((bytes, _source)) => self.handle_inbound(&bytes).await,
                    Err(ErrorKind::Timeout(_)) => continue,
                    Err(ErrorKind::TransportClosed) => break,
                    Err(e) => {
                        self.observer.on_error(&e);
                        continue;
                    }
                }
            }
        })
    }

    async fn handle_inbound(&self, bytes: &[u8]) {
        let now = Instant::now();

        let packet = match media_rtp::RtpPacket::parse(bytes.to_vec()) {
            Ok(p) => p,
            Err(e) => {
                let mut inner = self.inner.lock().await;
                inner.statistics.packets_malformed += 1;
                drop(inner);
                self.observer.on_error(&ErrorKind::MalformedRtp(e.to_string()));
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if !inner.direction.can_receive() {
            return;
        }

        inner.statistics.touch(now);

        let (_seq, _ts) = inner
            .rtp_stream
            .record_reception(now, packet.ssrc, packet.sequence_number, packet.timestamp);

        if packet.pt == inner.dtmf_coder.config.payload_type {
            let extended_ts = media_rtp::ExtendedRtpTimestamp(u64::from(packet.timestamp.0));
            if let Some(event) = inner.dtmf_coder.receive(now, extended_ts, &packet.payload) {
                inner.statistics.dtmf_events_received += 1;
                drop(inner);
                self.observer.on_dtmf(event);
            }
            return;
        }

        if inner.jitter_buffer.is_some() {
            let jitter_buffer = inner.jitter_buffer.as_mut().expect("checked above");
            jitter_buffer.push(
                now,
                packet.ssrc,
                media_rtp::ExtendedSequenceNumber(u64::from(packet.sequence_number.0)),
                media_rtp::ExtendedRtpTimestamp(u64::from(packet.timestamp.0)),
                packet,
            );
            drop(inner);
            self.drain_ready_jitter_packets(now).await;
        } else {
            inner.statistics.audio_packets_received += 1;
            inner.statistics.audio_bytes_received += packet.payload.len() as u64;
            let payload = packet.payload;
            drop(inner);
            self.observer.on_audio(&payload);
        }
    }

    /// Pops every packet whose play-out time has elapsed and delivers it to
    /// the observer, in sequence order. Driven both from `handle_inbound`
    /// (as soon as a new packet arrives) and from a standing tick
    /// (`spawn_jitter_drain_tick`), since a buffered packet's play-out time
    /// can elapse with no further inbound traffic to trigger its release.
    async fn drain_ready_jitter_packets(&self, now: Instant) {
        let mut inner = self.inner.lock().await;

        let Some(jitter_buffer) = inner.jitter_buffer.as_mut() else {
            return;
        };

        let ready = jitter_buffer.pop_ready(now);
        if ready.is_empty() {
            return;
        }
        let stats = jitter_buffer.stats();

        for packet in &ready {
            inner.statistics.audio_packets_received += 1;
            inner.statistics.audio_bytes_received += packet.payload.len() as u64;
        }
        inner.statistics.jitter_late_dropped = stats.late_dropped;
        inner.statistics.jitter_overflow_dropped = stats.overflow_dropped;

        drop(inner);
        for packet in ready {
            self.observer.on_audio(&packet.payload);
        }
    }

    fn spawn_jitter_drain_tick(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let ptime_ms = self.inner.lock().await.ptime_ms;
                tokio::time::sleep(Duration::from_millis(u64::from(ptime_ms))).await;

                if self.state() == MediaSessionState::Closed {
                    break;
                }

                self.drain_ready_jitter_packets(Instant::now()).await;
            }
        })
    }

    fn spawn_rtcp_tick(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let interval = {
                    let inner = self.inner.lock().await;
                    inner.rtcp_reporter_interval()
                };
                tokio::time::sleep(interval).await;

                let mut inner = self.inner.lock().await;

                let sender_info = inner.sent_since_last_rtcp_tick.then(|| SenderInfo {
                    ssrc: inner.rtp_stream.ssrc,
                    ntp_timestamp: media_rtp::ntp_timestamp_now(Instant::now()),
                    rtp_timestamp: inner.rtp_stream.current_timestamp().0,
                    packet_count: inner.rtp_stream.packets_sent() as u32,
                    octet_count: inner.rtp_stream.bytes_sent() as u32,
                });
                inner.sent_since_last_rtcp_tick = false;

                let reception: Vec<_> = inner
                    .rtp_stream
                    .peer_ssrc()
                    .map(|ssrc| ReceptionReportInput {
                        ssrc,
                        fraction_lost: 0,
                        cumulative_lost: 0,
                        extended_highest_sequence_number: inner
                            .rtp_stream
                            .reception_highest_sequence_number(),
                        interarrival_jitter: inner.rtp_stream.reception_jitter(),
                        last_sr: 0,
                        delay_since_last_sr: 0,
                    })
                    .into_iter()
                    .collect();

                let report_bytes = inner.rtcp_reporter.build_report(sender_info, &reception);
                inner.statistics.rtcp_reports_sent += 1;
                drop(inner);

                let _ = self.rtcp_transport.send(&report_bytes).await;
            }
        })
    }
}

impl Inner {
    fn rtcp_reporter_interval(&self) -> Duration {
        self.rtcp_interval
    }
}
