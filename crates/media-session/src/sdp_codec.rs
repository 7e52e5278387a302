use crate::codec::{self, Codec};
use crate::direction::Direction;
use media_sdp::{
    Connection, Fmtp, Media, MediaDescription, MediaType, Origin, RtpMap, SessionDescription,
    Time, TransportProtocol,
};
use std::net::IpAddr;

/// Local capabilities one side offers or answers with: codecs in preference
/// order plus optional DTMF support.
#[derive(Debug, Clone)]
pub struct LocalCapabilities {
    pub codecs: Vec<Codec>,
    pub dtmf_payload_type: Option<u8>,
}

impl LocalCapabilities {
    pub fn from_names(names: &[&str], dtmf_payload_type: Option<u8>) -> Self {
        LocalCapabilities {
            codecs: names.iter().filter_map(|n| codec::by_name(n)).collect(),
            dtmf_payload_type,
        }
    }
}

/// Parameters used to build an offer or answer's `m=` line and attributes.
#[derive(Debug, Clone)]
pub struct SdpBuildParams {
    pub host: IpAddr,
    pub port: u16,
    pub rtcp_port: Option<u16>,
    pub session_id: u64,
    pub session_version: u64,
    pub direction: Direction,
    pub ptime_ms: u32,
    pub capabilities: LocalCapabilities,
}

pub fn build(params: &SdpBuildParams) -> SessionDescription {
    let origin = Origin {
        username: "-".into(),
        session_id: params.session_id,
        session_version: params.session_version,
        address: params.host,
    };

    let mut fmts = Vec::new();
    let mut rtpmap = Vec::new();

    for c in &params.capabilities.codecs {
        let pt = c.static_pt.expect("only static codecs are offered");
        fmts.push(pt);
        rtpmap.push(RtpMap {
            payload: pt,
            encoding: c.name.into(),
            clock_rate: c.clock_rate,
            channels: c.channels,
        });
    }

    let mut fmtp = Vec::new();
    if let Some(dtmf_pt) = params.capabilities.dtmf_payload_type {
        fmts.push(dtmf_pt);
        rtpmap.push(RtpMap {
            payload: dtmf_pt,
            encoding: "telephone-event".into(),
            clock_rate: 8000,
            channels: None,
        });
        fmtp.push(Fmtp::telephone_event(dtmf_pt));
    }

    let media_description = MediaDescription {
        media: Media {
            media_type: MediaType::Audio,
            port: params.port,
            proto: TransportProtocol::RtpAvp,
            fmts,
        },
        connection: None,
        direction: params.direction.into(),
        rtcp: params
            .rtcp_port
            .filter(|&p| p != params.port + 1)
            .map(|port| media_sdp::Rtcp { port }),
        ptime: Some(params.ptime_ms),
        rtpmap,
        fmtp,
        ssrc: Vec::new(),
    };

    SessionDescription {
        origin,
        session_name: "-".into(),
        connection: Some(Connection { address: params.host }),
        time: Time { start: 0, stop: 0 },
        media_descriptions: vec![media_description],
    }
}

/// One media line's negotiated outcome: selected codec, optional DTMF pt,
/// resolved direction (from this side's perspective) and ptime.
#[derive(Debug, Clone, Copy)]
pub struct Negotiated {
    pub payload_type: u8,
    pub clock_rate: u32,
    pub dtmf_payload_type: Option<u8>,
    pub direction: Direction,
    pub ptime_ms: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum IntersectError {
    #[error("no codec in common between offer and local capabilities")]
    NoCommonCodec,
}

/// Earliest-offered-codec-wins intersection against `local`. The offer's
/// direction is dualized to get this side's resolved direction.
pub fn intersect(
    offer: &MediaDescription,
    local: &LocalCapabilities,
    default_ptime_ms: u32,
) -> Result<Negotiated, IntersectError> {
    let payload_type = offer
        .media
        .fmts
        .iter()
        .copied()
        .find(|&pt| local.codecs.iter().any(|c| c.static_pt == Some(pt)))
        .ok_or(IntersectError::NoCommonCodec)?;

    let clock_rate = codec::by_payload_type(payload_type)
        .map(|c| c.clock_rate)
        .unwrap_or(8000);

    let dtmf_payload_type = local.dtmf_payload_type.filter(|&local_pt| {
        offer.rtpmap(local_pt).is_some_and(|r| r.encoding.eq_ignore_ascii_case("telephone-event"))
    });

    let ptime_ms = offer.ptime.unwrap_or(default_ptime_ms);

    Ok(Negotiated {
        payload_type,
        clock_rate,
        dtmf_payload_type,
        direction: Direction::from(offer.direction).dual(),
        ptime_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn params(codecs: &[&str]) -> SdpBuildParams {
        SdpBuildParams {
            host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 15000,
            rtcp_port: None,
            session_id: 1,
            session_version: 1,
            direction: Direction::SendRecv,
            ptime_ms: 20,
            capabilities: LocalCapabilities::from_names(codecs, Some(101)),
        }
    }

    #[test]
    fn builds_offer_with_requested_codecs_in_order() {
        let sdp = build(&params(&["PCMU", "PCMA"]));
        let media = &sdp.media_descriptions[0];
        assert_eq!(media.media.fmts, vec![0, 8, 101]);
    }

    #[test]
    fn intersection_picks_earliest_offered_codec_present_locally() {
        let offer_sdp = build(&params(&["PCMU", "PCMA"]));
        let local = LocalCapabilities::from_names(&["PCMA", "PCMU"], Some(101));

        let negotiated = intersect(&offer_sdp.media_descriptions[0], &local, 20).unwrap();
        assert_eq!(negotiated.payload_type, 0); // PCMU, offered first
        assert_eq!(negotiated.dtmf_payload_type, Some(101));
    }

    #[test]
    fn intersection_fails_with_no_common_codec() {
        let offer_sdp = build(&params(&["G729"]));
        let local = LocalCapabilities::from_names(&["PCMU"], None);

        assert!(matches!(
            intersect(&offer_sdp.media_descriptions[0], &local, 20),
            Err(IntersectError::NoCommonCodec)
        ));
    }
}
