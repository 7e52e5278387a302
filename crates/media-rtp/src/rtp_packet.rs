use crate::{RtpTimestamp, SequenceNumber, Ssrc};
use bytes::Bytes;
use rtp_types::{prelude::RtpPacketWriter, RtpPacketBuilder};

/// A decoded RTP packet, header fields plus opaque payload bytes.
///
/// No header extensions, no CSRC list, no padding — this profile never
/// emits them and tolerates (skips) them from peers on parse.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    pub marker: bool,
    pub pt: u8,
    pub sequence_number: SequenceNumber,
    pub ssrc: Ssrc,
    pub timestamp: RtpTimestamp,
    pub payload: Bytes,
}

impl RtpPacket {
    pub fn to_vec(&self) -> Vec<u8> {
        let builder = RtpPacketBuilder::<_, Vec<u8>>::new()
            .marker_bit(self.marker)
            .payload_type(self.pt)
            .sequence_number(self.sequence_number.0)
            .ssrc(self.ssrc.0)
            .timestamp(self.timestamp.0)
            .payload(&self.payload[..]);

        let mut vec = Vec::with_capacity(12 + self.payload.len());
        let mut writer = RtpPacketWriterVec { output: &mut vec };
        builder.write(&mut writer).expect("fixed RTP header always fits");
        vec
    }

    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self, rtp_types::RtpParseError> {
        let packet: Bytes = bytes.into();
        let parsed = rtp_types::RtpPacket::parse(&packet[..])?;

        Ok(Self {
            marker: parsed.marker_bit(),
            pt: parsed.payload_type(),
            sequence_number: SequenceNumber(parsed.sequence_number()),
            ssrc: Ssrc(parsed.ssrc()),
            timestamp: RtpTimestamp(parsed.timestamp()),
            payload: packet.slice_ref(parsed.payload()),
        })
    }
}

struct RtpPacketWriterVec<'a> {
    output: &'a mut Vec<u8>,
}

impl<'a> RtpPacketWriter for RtpPacketWriterVec<'a> {
    type Output = ();
    type Payload = &'a [u8];
    type Extension = ();

    fn reserve(&mut self, size: usize) {
        if self.output.len() < size {
            self.output.reserve(size - self.output.len());
        }
    }

    fn push(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data)
    }

    fn push_extension(&mut self, _extension_data: &Self::Extension) {}

    fn push_payload(&mut self, data: &Self::Payload) {
        self.push(data)
    }

    fn padding(&mut self, _size: u8) {}

    fn finish(&mut self) -> Self::Output {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_format() {
        let packet = RtpPacket {
            marker: true,
            pt: 0,
            sequence_number: SequenceNumber(1000),
            ssrc: Ssrc(0xdead_beef),
            timestamp: RtpTimestamp(160),
            payload: Bytes::from_static(&[0x7f; 160]),
        };

        let bytes = packet.to_vec();
        let parsed = RtpPacket::parse(bytes).unwrap();

        assert_eq!(parsed.marker, packet.marker);
        assert_eq!(parsed.pt, packet.pt);
        assert_eq!(parsed.sequence_number, packet.sequence_number);
        assert_eq!(parsed.ssrc, packet.ssrc);
        assert_eq!(parsed.timestamp, packet.timestamp);
        assert_eq!(parsed.payload, packet.payload);
    }
}
