//! RTP/RTCP packet types and the stateful pieces of the audio data path:
//! sequence/timestamp arithmetic, the jitter buffer, RFC 4733 DTMF coding
//! and RTCP report construction.
#![warn(unreachable_pub)]

mod dtmf;
mod jitter_buffer;
mod ntp_timestamp;
mod rtcp;
mod rtp_packet;

pub use dtmf::{
    DtmfCoder, DtmfConfig, DtmfEvent, DtmfReceiver, DtmfSender, TelephoneEventPayload,
    UnsupportedDigitError,
};
pub use jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferStats};
pub use ntp_timestamp::NtpTimestamp;
pub use rtcp::{
    ntp_timestamp_now, ParseRtcpError, ReceptionReport, ReceptionReportInput, RtcpReport,
    RtcpReporter, SenderInfo,
};
pub use rtp_packet::RtpPacket;

pub use rtcp_types;
pub use rtp_types;

/// 32-bit RTP/RTCP synchronization source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ssrc(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtendedSequenceNumber(pub u64);

impl ExtendedSequenceNumber {
    pub fn increase_one(&mut self) -> SequenceNumber {
        self.0 += 1;
        self.truncated()
    }

    pub fn truncated(&self) -> SequenceNumber {
        SequenceNumber(self.0 as u16)
    }

    pub fn rollover_count(&self) -> u64 {
        self.0 >> 16
    }

    pub fn guess_extended(&self, seq: SequenceNumber) -> ExtendedSequenceNumber {
        ExtendedSequenceNumber(wrapping_counter_to_u64_counter(
            self.0,
            u64::from(seq.0),
            u64::from(u16::MAX),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RtpTimestamp(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExtendedRtpTimestamp(pub u64);

impl ExtendedRtpTimestamp {
    pub fn truncated(&self) -> RtpTimestamp {
        RtpTimestamp(self.0 as u32)
    }

    pub fn rollover_count(&self) -> u64 {
        self.0 >> 32
    }

    pub fn guess_extended(&self, ts: RtpTimestamp) -> ExtendedRtpTimestamp {
        ExtendedRtpTimestamp(wrapping_counter_to_u64_counter(
            self.0,
            u64::from(ts.0),
            u64::from(u32::MAX),
        ))
    }
}

fn wrapping_counter_to_u64_counter(reference: u64, got: u64, max: u64) -> u64 {
    let base = (reference & !max) | got;

    let below = base.wrapping_sub(1u64 << max.count_ones());
    let above = base.wrapping_add(1u64 << max.count_ones());

    let dist_base = reference.abs_diff(base);
    let dist_below = reference.abs_diff(below);
    let dist_above = reference.abs_diff(above);

    if dist_below < dist_base && dist_below <= dist_above {
        below
    } else if dist_above < dist_base && dist_above < dist_below {
        above
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_rollover() {
        let reference = ExtendedSequenceNumber(65535);
        assert_eq!(
            reference.guess_extended(SequenceNumber(65534)),
            ExtendedSequenceNumber(65534)
        );
        assert_eq!(
            reference.guess_extended(SequenceNumber(0)),
            ExtendedSequenceNumber(65536)
        );
        assert_eq!(
            reference.guess_extended(SequenceNumber(1)),
            ExtendedSequenceNumber(65537)
        );
    }

    #[test]
    fn timestamp_rollover() {
        let reference = ExtendedRtpTimestamp(u64::from(u32::MAX));
        assert_eq!(
            reference.guess_extended(RtpTimestamp(0)),
            ExtendedRtpTimestamp(u64::from(u32::MAX) + 1)
        );
    }
}
