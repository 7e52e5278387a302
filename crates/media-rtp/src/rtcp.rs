//! RTCP report construction and parsing: Sender/Receiver Report plus an
//! SDES chunk carrying CNAME, per RFC 3550.
//!
//! SR/RR are built with `rtcp-types`' compound builder, grounded on the
//! the report-queue machinery this profile is distilled from. That codebase
//! never builds an SDES packet (it only parses and discards one), so the
//! CNAME chunk here is encoded by hand against the fixed RFC 3550 §6.5
//! layout instead of guessing at an unverified builder API.

use crate::ntp_timestamp::NtpTimestamp;
use crate::Ssrc;
use rtcp_types::{
    Compound, CompoundBuilder, Packet, ReceiverReport, ReportBlock, RtcpPacketWriterExt,
    SenderReport,
};
use std::time::Instant;

const SDES_CNAME_ITEM: u8 = 1;
const RTCP_PT_SDES: u8 = 202;

/// Per-peer reception state supplied to [`RtcpReporter::build_report`].
#[derive(Debug, Clone, Copy)]
pub struct ReceptionReportInput {
    pub ssrc: Ssrc,
    pub fraction_lost: u8,
    pub cumulative_lost: u32,
    pub extended_highest_sequence_number: u32,
    pub interarrival_jitter: u32,
    pub last_sr: u32,
    pub delay_since_last_sr: u32,
}

/// Summary of an inbound Sender Report's sender-info fields.
#[derive(Debug, Clone, Copy)]
pub struct SenderInfo {
    pub ssrc: Ssrc,
    pub ntp_timestamp: u64,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

/// Parsed reception report block, as carried by either SR or RR.
#[derive(Debug, Clone, Copy)]
pub struct ReceptionReport {
    pub ssrc: Ssrc,
    pub fraction_lost: u8,
    pub cumulative_lost: u32,
    pub interarrival_jitter: u32,
    pub last_sr: u32,
    pub delay_since_last_sr: u32,
}

/// One inbound compound RTCP packet, summarized for `MediaSession`.
#[derive(Debug, Clone, Default)]
pub struct RtcpReport {
    pub sender_info: Option<SenderInfo>,
    pub reception_reports: Vec<ReceptionReport>,
    pub cname: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseRtcpError {
    #[error("malformed compound RTCP packet: {0}")]
    Malformed(String),
}

/// Builds and parses the SR/RR + SDES compound this profile exchanges.
pub struct RtcpReporter {
    ssrc: Ssrc,
    cname: String,
}

impl RtcpReporter {
    pub fn new(ssrc: Ssrc, cname: String) -> Self {
        RtcpReporter { ssrc, cname }
    }

    /// Build a compound packet: a Sender Report when `sender` is `Some`
    /// (packets were sent since the last tick), otherwise a Receiver
    /// Report, followed by an SDES CNAME chunk.
    pub fn build_report(
        &self,
        sender: Option<SenderInfo>,
        reception: &[ReceptionReportInput],
    ) -> Vec<u8> {
        let mut compound = CompoundBuilder::default();

        if let Some(sender) = sender {
            let mut sr = SenderReport::builder(sender.ssrc.0)
                .ntp_timestamp(sender.ntp_timestamp)
                .rtp_timestamp(sender.rtp_timestamp)
                .packet_count(sender.packet_count)
                .octet_count(sender.octet_count);

            for report in reception {
                sr = sr.add_report_block(Self::report_block(report));
            }

            compound = compound.add_packet(sr);
        } else {
            let mut rr = ReceiverReport::builder(self.ssrc.0);

            for report in reception {
                rr = rr.add_report_block(Self::report_block(report));
            }

            compound = compound.add_packet(rr);
        }

        let mut buf = vec![0u8; compound.calculate_size().expect("fixed-size fields")];
        let len = compound.write_into_unchecked(&mut buf);
        buf.truncate(len);

        buf.extend_from_slice(&encode_sdes_cname(self.ssrc.0, &self.cname));
        buf
    }

    fn report_block(report: &ReceptionReportInput) -> rtcp_types::ReportBlockBuilder {
        ReportBlock::builder(report.ssrc.0)
            .fraction_lost(report.fraction_lost)
            .cumulative_lost(report.cumulative_lost)
            .extended_sequence_number(report.extended_highest_sequence_number)
            .interarrival_jitter(report.interarrival_jitter)
            .last_sender_report_timestamp(report.last_sr)
            .delay_since_last_sender_report_timestamp(report.delay_since_last_sr)
    }

    pub fn parse(bytes: &[u8]) -> Result<RtcpReport, ParseRtcpError> {
        let compound =
            Compound::parse(bytes).map_err(|e| ParseRtcpError::Malformed(e.to_string()))?;

        let mut report = RtcpReport::default();

        for packet in compound {
            let packet = packet.map_err(|e| ParseRtcpError::Malformed(e.to_string()))?;

            match packet {
                Packet::Sr(sr) => {
                    report.sender_info = Some(SenderInfo {
                        ssrc: Ssrc(sr.ssrc()),
                        ntp_timestamp: sr.ntp_timestamp(),
                        rtp_timestamp: sr.rtp_timestamp(),
                        packet_count: sr.packet_count(),
                        octet_count: sr.octet_count(),
                    });

                    for block in sr.report_blocks() {
                        report.reception_reports.push(reception_report(&block));
                    }
                }
                Packet::Rr(rr) => {
                    for block in rr.report_blocks() {
                        report.reception_reports.push(reception_report(&block));
                    }
                }
                Packet::Sdes(_) => {
                    if let Some(cname) = parse_sdes_cname(bytes) {
                        report.cname = Some(cname);
                    }
                }
                _ => {}
            }
        }

        Ok(report)
    }
}

fn reception_report(block: &ReportBlock<'_>) -> ReceptionReport {
    ReceptionReport {
        ssrc: Ssrc(block.ssrc()),
        fraction_lost: block.fraction_lost(),
        cumulative_lost: block.cumulative_lost(),
        interarrival_jitter: block.interarrival_jitter(),
        last_sr: block.last_sender_report_timestamp(),
        delay_since_last_sr: block.delay_since_last_sender_report_timestamp(),
    }
}

/// Wrap a now-correlated [`Instant`] as the NTP timestamp carried in a
/// Sender Report, convenience used by callers to avoid importing both types.
pub fn ntp_timestamp_now(now: Instant) -> u64 {
    NtpTimestamp::from_instant(now).to_fixed_u64()
}

fn encode_sdes_cname(ssrc: u32, cname: &str) -> Vec<u8> {
    let cname = &cname.as_bytes()[..cname.len().min(255)];

    let mut chunk = Vec::with_capacity(4 + 2 + cname.len());
    chunk.extend_from_slice(&ssrc.to_be_bytes());
    chunk.push(SDES_CNAME_ITEM);
    chunk.push(cname.len() as u8);
    chunk.extend_from_slice(cname);
    chunk.push(0); // end of item list

    while chunk.len() % 4 != 0 {
        chunk.push(0);
    }

    let total_len = 4 + chunk.len();
    let length_field = (total_len / 4 - 1) as u16;

    let mut packet = Vec::with_capacity(total_len);
    packet.push(0x80 | 1); // V=2, P=0, SC=1
    packet.push(RTCP_PT_SDES);
    packet.extend_from_slice(&length_field.to_be_bytes());
    packet.extend_from_slice(&chunk);
    packet
}

/// Best-effort extraction of the first CNAME chunk from a raw compound
/// packet. Returns `None` rather than erroring on anything unexpected —
/// CNAME is informational, never required for negotiation.
fn parse_sdes_cname(bytes: &[u8]) -> Option<String> {
    let mut offset = 0;

    while offset + 4 <= bytes.len() {
        let first = bytes[offset];
        let pt = bytes[offset + 1];
        let length_words = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        let packet_len = (length_words + 1) * 4;

        if offset + packet_len > bytes.len() {
            return None;
        }

        if pt == RTCP_PT_SDES {
            let sc = first & 0x1f;
            let mut chunk_offset = offset + 4;

            for _ in 0..sc {
                if chunk_offset + 4 > bytes.len() {
                    return None;
                }
                let mut item_offset = chunk_offset + 4;

                loop {
                    let Some(&item_type) = bytes.get(item_offset) else {
                        return None;
                    };
                    if item_type == 0 {
                        break;
                    }
                    let len = *bytes.get(item_offset + 1)? as usize;
                    let text_start = item_offset + 2;

                    if item_type == SDES_CNAME_ITEM {
                        let text = bytes.get(text_start..text_start + len)?;
                        return std::str::from_utf8(text).ok().map(str::to_owned);
                    }

                    item_offset = text_start + len;
                }

                chunk_offset = (item_offset + 4) & !3;
            }
        }

        offset += packet_len;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_report_round_trips() {
        let reporter = RtcpReporter::new(Ssrc(42), "session-42".to_owned());

        let bytes = reporter.build_report(
            Some(SenderInfo {
                ssrc: Ssrc(42),
                ntp_timestamp: ntp_timestamp_now(Instant::now()),
                rtp_timestamp: 8000,
                packet_count: 5,
                octet_count: 800,
            }),
            &[],
        );

        let report = RtcpReporter::parse(&bytes).unwrap();
        let sender = report.sender_info.unwrap();
        assert_eq!(sender.ssrc, Ssrc(42));
        assert_eq!(sender.packet_count, 5);
        assert_eq!(report.cname.as_deref(), Some("session-42"));
    }

    #[test]
    fn receiver_report_carries_report_block() {
        let reporter = RtcpReporter::new(Ssrc(7), "cname".to_owned());

        let bytes = reporter.build_report(
            None,
            &[ReceptionReportInput {
                ssrc: Ssrc(99),
                fraction_lost: 3,
                cumulative_lost: 10,
                extended_highest_sequence_number: 1000,
                interarrival_jitter: 25,
                last_sr: 0,
                delay_since_last_sr: 0,
            }],
        );

        let report = RtcpReporter::parse(&bytes).unwrap();
        assert!(report.sender_info.is_none());
        assert_eq!(report.reception_reports.len(), 1);
        assert_eq!(report.reception_reports[0].ssrc, Ssrc(99));
        assert_eq!(report.reception_reports[0].cumulative_lost, 10);
    }
}
