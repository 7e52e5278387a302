//! RFC 4733 telephone-event DTMF coding.
//!
//! This module is sans-io: it turns a `(digit, duration)` pair into the
//! sequence of 4-byte telephone-event payloads a sender must emit, and
//! coalesces inbound payloads sharing a timestamp back into one
//! [`DtmfEvent`]. RTP framing (sequence number, fixed timestamp, marker bit)
//! is the caller's responsibility, since it shares the audio stream's
//! sequence counter.

use crate::ExtendedRtpTimestamp;
use std::time::{Duration, Instant};

/// Tuning knobs for DTMF send/receive.
#[derive(Debug, Clone, Copy)]
pub struct DtmfConfig {
    /// Dynamic RTP payload type telephone-event is negotiated on.
    pub payload_type: u8,
    /// Clock rate of the telephone-event payload (always 8000 for audio).
    pub clock_rate: u32,
    /// Interval between redundant packets while an event is in progress.
    pub packet_interval: Duration,
    /// Silence after which an in-flight event is finalized without an `E` packet.
    pub event_timeout: Duration,
}

impl Default for DtmfConfig {
    fn default() -> Self {
        DtmfConfig {
            payload_type: 101,
            clock_rate: 8000,
            packet_interval: Duration::from_millis(20),
            event_timeout: Duration::from_millis(60),
        }
    }
}

/// A finalized DTMF digit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfEvent {
    pub digit: char,
    pub duration_ms: u32,
    pub volume: u8,
}

#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a valid DTMF digit")]
pub struct UnsupportedDigitError(char);

fn digit_to_event_code(digit: char) -> Result<u8, UnsupportedDigitError> {
    match digit {
        '0'..='9' => Ok(digit as u8 - b'0'),
        '*' => Ok(10),
        '#' => Ok(11),
        'A'..='D' => Ok(12 + (digit as u8 - b'A')),
        other => Err(UnsupportedDigitError(other)),
    }
}

fn event_code_to_digit(code: u8) -> Option<char> {
    match code {
        0..=9 => Some((b'0' + code) as char),
        10 => Some('*'),
        11 => Some('#'),
        12..=15 => Some((b'A' + (code - 12)) as char),
        _ => None,
    }
}

/// The RFC 4733 telephone-event payload: event code, end/reserved/volume
/// octet, 16-bit duration in timestamp units.
///
/// [RFC4733](https://www.rfc-editor.org/rfc/rfc4733.html#section-2.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelephoneEventPayload {
    pub event: u8,
    pub end: bool,
    pub volume: u8,
    pub duration: u16,
}

impl TelephoneEventPayload {
    pub fn encode(self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0] = self.event;
        bytes[1] = (u8::from(self.end) << 7) | (self.volume & 0x3f);
        bytes[2..4].copy_from_slice(&self.duration.to_be_bytes());
        bytes
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let [event, flags, dur_hi, dur_lo] = *bytes.first_chunk::<4>()?;

        Some(TelephoneEventPayload {
            event,
            end: flags & 0x80 != 0,
            volume: flags & 0x3f,
            duration: u16::from_be_bytes([dur_hi, dur_lo]),
        })
    }
}

/// Drives the outbound side of one DTMF event: repeated packets at a fixed
/// timestamp, incrementing duration, three redundant `E`-marked packets at
/// the end.
pub struct DtmfSender {
    event: u8,
    volume: u8,
    samples_per_tick: u32,
    total_samples: u32,
    elapsed_samples: u32,
    end_repeats_remaining: u8,
    finished: bool,
}

impl DtmfSender {
    pub fn new(
        config: &DtmfConfig,
        digit: char,
        duration_ms: u32,
        volume: u8,
    ) -> Result<Self, UnsupportedDigitError> {
        let event = digit_to_event_code(digit)?;
        let samples_per_tick =
            (config.packet_interval.as_millis() as u32 * config.clock_rate) / 1000;
        let total_samples = (duration_ms * config.clock_rate) / 1000;

        Ok(DtmfSender {
            event,
            volume: volume.min(0x3f),
            samples_per_tick: samples_per_tick.max(1),
            total_samples: total_samples.max(1),
            elapsed_samples: 0,
            end_repeats_remaining: 3,
            finished: false,
        })
    }

    /// Payload for the next tick, or `None` once the three redundant end
    /// packets have been emitted.
    pub fn next_tick(&mut self) -> Option<TelephoneEventPayload> {
        if self.finished {
            return None;
        }

        self.elapsed_samples = (self.elapsed_samples + self.samples_per_tick).min(self.total_samples);
        let end = self.elapsed_samples >= self.total_samples;

        if end {
            self.end_repeats_remaining -= 1;
            if self.end_repeats_remaining == 0 {
                self.finished = true;
            }
        }

        Some(TelephoneEventPayload {
            event: self.event,
            end,
            volume: self.volume,
            duration: self.elapsed_samples.min(u32::from(u16::MAX)) as u16,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

struct InFlightEvent {
    timestamp: ExtendedRtpTimestamp,
    event: u8,
    volume: u8,
    max_duration: u16,
    last_seen: Instant,
    finalized: bool,
}

/// Coalesces inbound telephone-event payloads into [`DtmfEvent`]s.
pub struct DtmfReceiver {
    config: DtmfConfig,
    current: Option<InFlightEvent>,
}

impl DtmfReceiver {
    pub fn new(config: DtmfConfig) -> Self {
        DtmfReceiver {
            config,
            current: None,
        }
    }

    /// Feed one inbound payload. Returns a finalized event on the `E` packet
    /// (or its first occurrence — duplicates are swallowed).
    pub fn push(
        &mut self,
        now: Instant,
        timestamp: ExtendedRtpTimestamp,
        payload: TelephoneEventPayload,
    ) -> Option<DtmfEvent> {
        let stale = self
            .current
            .as_ref()
            .is_some_and(|e| e.timestamp != timestamp);

        // A new timestamp arriving while the previous event was never
        // explicitly ended (peer lost the final packets) finalizes it now.
        let timed_out_previous = if stale { self.finalize_current() } else { None };

        let inflight = self.current.get_or_insert_with(|| InFlightEvent {
            timestamp,
            event: payload.event,
            volume: payload.volume,
            max_duration: 0,
            last_seen: now,
            finalized: false,
        });

        inflight.last_seen = now;
        inflight.max_duration = inflight.max_duration.max(payload.duration);

        if payload.end {
            if inflight.finalized {
                return timed_out_previous;
            }
            inflight.finalized = true;
            return self.finalize_current().or(timed_out_previous);
        }

        timed_out_previous
    }

    /// Call periodically; finalizes an in-flight event that has gone silent
    /// for longer than `event_timeout` without an `E` packet.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<DtmfEvent> {
        let timed_out = self
            .current
            .as_ref()
            .is_some_and(|e| !e.finalized && now.duration_since(e.last_seen) >= self.config.event_timeout);

        if timed_out {
            self.finalize_current()
        } else {
            None
        }
    }

    fn finalize_current(&mut self) -> Option<DtmfEvent> {
        let inflight = self.current.take()?;
        let digit = event_code_to_digit(inflight.event)?;

        Some(DtmfEvent {
            digit,
            duration_ms: (u32::from(inflight.max_duration) * 1000) / self.config.clock_rate,
            volume: inflight.volume,
        })
    }
}

/// Bundles a sender and receiver sharing the same DTMF payload-type config.
pub struct DtmfCoder {
    pub config: DtmfConfig,
    receiver: DtmfReceiver,
}

impl DtmfCoder {
    pub fn new(config: DtmfConfig) -> Self {
        DtmfCoder {
            receiver: DtmfReceiver::new(config),
            config,
        }
    }

    pub fn begin_send(
        &self,
        digit: char,
        duration_ms: u32,
        volume: u8,
    ) -> Result<DtmfSender, UnsupportedDigitError> {
        DtmfSender::new(&self.config, digit, duration_ms, volume)
    }

    pub fn receive(
        &mut self,
        now: Instant,
        timestamp: ExtendedRtpTimestamp,
        payload: &[u8],
    ) -> Option<DtmfEvent> {
        let payload = TelephoneEventPayload::parse(payload)?;
        self.receiver.push(now, timestamp, payload)
    }

    pub fn poll_timeout(&mut self, now: Instant) -> Option<DtmfEvent> {
        self.receiver.poll_timeout(now)
    }
}
