use bytes::Bytes;
use media_rtp::{
    ExtendedRtpTimestamp, ExtendedSequenceNumber, RtpPacket, RtpTimestamp, SequenceNumber, Ssrc,
};
use rand::Rng;
use std::time::Instant;

/// Per-peer-SSRC reception bookkeeping used to fill RTCP report blocks:
/// highest extended sequence number seen and the RFC 3550 Appendix A.8
/// interarrival jitter estimate.
///
/// [RFC3550 A.8](https://www.rfc-editor.org/rfc/rfc3550#appendix-A.8)
struct ReceptionState {
    ssrc: Ssrc,
    base_sequence_number: ExtendedSequenceNumber,
    last: Option<(Instant, ExtendedRtpTimestamp, ExtendedSequenceNumber)>,
    jitter: f64,
    packets_received: u64,
}

impl ReceptionState {
    fn new(ssrc: Ssrc, sequence_number: SequenceNumber) -> Self {
        ReceptionState {
            ssrc,
            base_sequence_number: ExtendedSequenceNumber(u64::from(sequence_number.0)),
            last: None,
            jitter: 0.0,
            packets_received: 0,
        }
    }

    fn update(
        &mut self,
        now: Instant,
        clock_rate: u32,
        sequence_number: SequenceNumber,
        timestamp: RtpTimestamp,
    ) -> (ExtendedSequenceNumber, ExtendedRtpTimestamp) {
        self.packets_received += 1;

        let Some((last_instant, last_timestamp, last_sequence_number)) = self.last else {
            let extended_ts = ExtendedRtpTimestamp(u64::from(timestamp.0));
            let extended_seq = ExtendedSequenceNumber(u64::from(sequence_number.0));
            self.last = Some((now, extended_ts, extended_seq));
            return (extended_seq, extended_ts);
        };

        let extended_ts = last_timestamp.guess_extended(timestamp);
        let extended_seq = last_sequence_number.guess_extended(sequence_number);

        let arrival_delta = (now - last_instant).as_secs_f64() * f64::from(clock_rate);
        let timestamp_delta = timestamp.0 as i64 - last_timestamp.truncated().0 as i64;
        let d = (arrival_delta as i64 - timestamp_delta).abs();

        self.jitter += (d as f64 - self.jitter) / 16.0;
        self.last = Some((now, extended_ts, extended_seq));

        (extended_seq, extended_ts)
    }

    fn highest_sequence_number(&self) -> ExtendedSequenceNumber {
        self.last.map(|(_, _, seq)| seq).unwrap_or(self.base_sequence_number)
    }
}

/// One RTP source+sink: session-stable SSRC, monotonic outbound sequence and
/// timestamp, and per-peer inbound reception stats feeding RTCP reports.
///
/// Shared between the audio path and [`crate::dtmf::DtmfSession`] so DTMF
/// packets advance the same sequence counter as audio.
pub struct RtpStream {
    pub ssrc: Ssrc,
    pub payload_type: u8,
    pub clock_rate: u32,
    sequence: ExtendedSequenceNumber,
    timestamp: ExtendedRtpTimestamp,
    reception: Option<ReceptionState>,
    packets_sent: u64,
    bytes_sent: u64,
}

impl RtpStream {
    pub fn new(payload_type: u8, clock_rate: u32) -> Self {
        let mut rng = rand::rng();

        RtpStream {
            ssrc: Ssrc(rng.random()),
            payload_type,
            clock_rate,
            sequence: ExtendedSequenceNumber(u64::from(rng.random::<u16>())),
            timestamp: ExtendedRtpTimestamp(u64::from(rng.random::<u32>())),
            reception: None,
            packets_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Build the next audio frame: advances the outbound timestamp by
    /// `samples` first, then consumes the next sequence number.
    pub fn next_audio_frame(&mut self, payload: Bytes, marker: bool, samples: u32) -> RtpPacket {
        self.timestamp.0 += u64::from(samples);
        self.packets_sent += 1;
        self.bytes_sent += payload.len() as u64;

        RtpPacket {
            marker,
            pt: self.payload_type,
            sequence_number: self.sequence.increase_one(),
            ssrc: self.ssrc,
            timestamp: self.timestamp.truncated(),
            payload,
        }
    }

    /// Build a telephone-event frame at a caller-supplied fixed timestamp
    /// (DTMF keeps the same timestamp for an entire event) on a distinct
    /// payload type, still consuming this stream's sequence counter.
    pub fn next_dtmf_frame(
        &mut self,
        dtmf_payload_type: u8,
        payload: Bytes,
        marker: bool,
        timestamp: RtpTimestamp,
    ) -> RtpPacket {
        self.packets_sent += 1;
        self.bytes_sent += payload.len() as u64;

        RtpPacket {
            marker,
            pt: dtmf_payload_type,
            sequence_number: self.sequence.increase_one(),
            ssrc: self.ssrc,
            timestamp,
            payload,
        }
    }

    /// The timestamp a DTMF event starting "now" should use: the current
    /// outbound audio clock, unadvanced.
    pub fn current_timestamp(&self) -> RtpTimestamp {
        self.timestamp.truncated()
    }

    /// Record an inbound packet's sequence/timestamp for RTCP reporting.
    /// Resets reception state when the peer SSRC changes.
    pub fn record_reception(
        &mut self,
        now: Instant,
        ssrc: Ssrc,
        sequence_number: SequenceNumber,
        timestamp: RtpTimestamp,
    ) -> (ExtendedSequenceNumber, ExtendedRtpTimestamp) {
        if self.reception.as_ref().map(|r| r.ssrc) != Some(ssrc) {
            self.reception = Some(ReceptionState::new(ssrc, sequence_number));
        }

        self.reception
            .as_mut()
            .expect("just initialized above")
            .update(now, self.clock_rate, sequence_number, timestamp)
    }

    pub fn reception_jitter(&self) -> u32 {
        self.reception.as_ref().map(|r| r.jitter as u32).unwrap_or(0)
    }

    pub fn reception_highest_sequence_number(&self) -> u32 {
        self.reception
            .as_ref()
            .map(|r| r.highest_sequence_number().0 as u32)
            .unwrap_or(0)
    }

    pub fn reception_packets_received(&self) -> u64 {
        self.reception.as_ref().map(|r| r.packets_received).unwrap_or(0)
    }

    pub fn peer_ssrc(&self) -> Option<Ssrc> {
        self.reception.as_ref().map(|r| r.ssrc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_strictly_monotonic_and_wrap() {
        let mut stream = RtpStream::new(0, 8000);
        let first = stream.next_audio_frame(Bytes::from_static(&[0; 160]), false, 160);

        let mut last_seq = first.sequence_number.0;
        for _ in 0..(1u32 << 16) {
            let packet = stream.next_audio_frame(Bytes::from_static(&[0; 160]), false, 160);
            assert_eq!(packet.sequence_number.0, last_seq.wrapping_add(1));
            last_seq = packet.sequence_number.0;
        }
        assert_eq!(last_seq, first.sequence_number.0);
    }

    #[test]
    fn timestamp_advances_by_samples_per_frame() {
        let mut stream = RtpStream::new(0, 8000);
        let first = stream.next_audio_frame(Bytes::from_static(&[0; 160]), false, 160);
        let second = stream.next_audio_frame(Bytes::from_static(&[0; 160]), false, 160);

        assert_eq!(
            second.timestamp.0.wrapping_sub(first.timestamp.0),
            160
        );
    }

    #[test]
    fn dtmf_frame_keeps_timestamp_fixed_but_advances_sequence() {
        let mut stream = RtpStream::new(0, 8000);
        let audio = stream.next_audio_frame(Bytes::from_static(&[0; 160]), false, 160);
        let ts = stream.current_timestamp();

        let first = stream.next_dtmf_frame(101, Bytes::from_static(&[0; 4]), true, ts);
        let second = stream.next_dtmf_frame(101, Bytes::from_static(&[0; 4]), false, ts);

        assert_eq!(first.timestamp, second.timestamp);
        assert_eq!(second.sequence_number.0, first.sequence_number.0.wrapping_add(1));
        assert_ne!(first.sequence_number.0, audio.sequence_number.0);
    }

    #[test]
    fn reception_resets_on_new_peer_ssrc() {
        let mut stream = RtpStream::new(0, 8000);
        let now = Instant::now();

        stream.record_reception(now, Ssrc(1), SequenceNumber(10), RtpTimestamp(0));
        stream.record_reception(now, Ssrc(1), SequenceNumber(11), RtpTimestamp(160));
        assert_eq!(stream.reception_packets_received(), 2);

        stream.record_reception(now, Ssrc(2), SequenceNumber(0), RtpTimestamp(0));
        assert_eq!(stream.reception_packets_received(), 1);
        assert_eq!(stream.peer_ssrc(), Some(Ssrc(2)));
    }
}
