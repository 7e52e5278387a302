use crate::attributes::{Fmtp, Rtcp, RtpMap, SourceAttribute};
use crate::connection::Connection;
use crate::direction::Direction;
use crate::media::Media;
use std::fmt;

/// Part of a [`SessionDescription`](crate::SessionDescription) describing a
/// single media session. Trimmed to the RTP/AVP audio profile this crate
/// negotiates: no ICE, no DTLS/SRTP, no video-only attributes.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.14)
#[derive(Debug, Clone)]
pub struct MediaDescription {
    /// Media description's media field (m=)
    pub media: Media,

    /// Optional connection (c field), overriding the session-level one
    pub connection: Option<Connection>,

    /// Media direction attribute
    pub direction: Direction,

    /// rtcp attribute, when RTCP is not simply `RTP port + 1`
    pub rtcp: Option<Rtcp>,

    /// Packetization time in milliseconds (a=ptime)
    pub ptime: Option<u32>,

    /// RTP payload mappings
    pub rtpmap: Vec<RtpMap>,

    /// RTP encoding parameters
    pub fmtp: Vec<Fmtp>,

    /// SSRC attributes (a=ssrc)
    pub ssrc: Vec<SourceAttribute>,
}

impl MediaDescription {
    /// The [`RtpMap`] for a given payload type, if this description maps one.
    pub fn rtpmap(&self, payload: u8) -> Option<&RtpMap> {
        self.rtpmap.iter().find(|r| r.payload == payload)
    }

    /// The [`Fmtp`] for a given payload type, if this description carries one.
    pub fn fmtp(&self, payload: u8) -> Option<&Fmtp> {
        self.fmtp.iter().find(|f| f.format == payload)
    }
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "m={}\r\n", self.media)?;

        if let Some(conn) = &self.connection {
            write!(f, "c={conn}\r\n")?;
        }

        write!(f, "a={}\r\n", self.direction)?;

        if let Some(rtcp) = &self.rtcp {
            write!(f, "a=rtcp:{rtcp}\r\n")?;
        }

        if let Some(ptime) = self.ptime {
            write!(f, "a=ptime:{ptime}\r\n")?;
        }

        for rtpmap in &self.rtpmap {
            write!(f, "a=rtpmap:{rtpmap}\r\n")?;
        }

        for fmtp in &self.fmtp {
            write!(f, "a=fmtp:{fmtp}\r\n")?;
        }

        for ssrc in &self.ssrc {
            write!(f, "a=ssrc:{ssrc}\r\n")?;
        }

        Ok(())
    }
}
