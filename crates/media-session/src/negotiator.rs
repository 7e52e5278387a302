use crate::direction::Direction;
use crate::error::{Error, ErrorKind};
use crate::sdp_codec::{self, LocalCapabilities, Negotiated, SdpBuildParams};
use media_sdp::SessionDescription;
use rand::Rng;
use std::net::IpAddr;

/// `Idle -> {LocalOffer | RemoteOffer} -> {Established | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    LocalOffer,
    RemoteOffer,
    Established,
    Failed,
}

/// Drives one session's SDP offer/answer exchange: builds/parses the
/// session descriptions, runs codec intersection and direction
/// dualization, and hands back the negotiated parameters once settled.
///
/// Owns no transport or session id; callers attach the result to their
/// `MediaSession`/`Transport` themselves.
pub struct Negotiator {
    state: NegotiationState,
    host: IpAddr,
    local: LocalCapabilities,
    default_ptime_ms: u32,
    strict_answer: bool,
    sdp_session_id: u64,
    session_version: u64,
    offered_direction: Option<Direction>,
    remote: Option<SessionDescription>,
    negotiated: Option<Negotiated>,
}

impl Negotiator {
    pub fn new(host: IpAddr, local: LocalCapabilities, default_ptime_ms: u32, strict_answer: bool) -> Self {
        Negotiator {
            state: NegotiationState::Idle,
            host,
            local,
            default_ptime_ms,
            strict_answer,
            sdp_session_id: rand::rng().random(),
            session_version: 0,
            offered_direction: None,
            remote: None,
            negotiated: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.negotiated
    }

    pub fn remote(&self) -> Option<&SessionDescription> {
        self.remote.as_ref()
    }

    /// Requires `Idle`. Builds an offer with `direction` and transitions to
    /// `LocalOffer`.
    pub fn create_offer(
        &mut self,
        port: u16,
        rtcp_port: Option<u16>,
        direction: Direction,
    ) -> Result<SessionDescription, Error> {
        if self.state != NegotiationState::Idle {
            return Err(Error::new(ErrorKind::WrongState("create_offer requires Idle")));
        }

        self.session_version += 1;
        self.offered_direction = Some(direction);

        let sdp = sdp_codec::build(&SdpBuildParams {
            host: self.host,
            port,
            rtcp_port,
            session_id: self.sdp_session_id,
            session_version: self.session_version,
            direction,
            ptime_ms: self.default_ptime_ms,
            capabilities: self.local.clone(),
        });

        self.state = NegotiationState::LocalOffer;
        Ok(sdp)
    }

    /// Requires `Idle` or `RemoteOffer` (glare recovery: last offer wins).
    /// Records the remote description and transitions to `RemoteOffer`.
    pub fn process_offer(&mut self, offer: SessionDescription) -> Result<(), Error> {
        match self.state {
            NegotiationState::Idle | NegotiationState::RemoteOffer => {}
            _ => return Err(Error::new(ErrorKind::WrongState("process_offer requires Idle or RemoteOffer"))),
        }

        self.remote = Some(offer);
        self.state = NegotiationState::RemoteOffer;
        Ok(())
    }

    /// Requires `RemoteOffer`. Intersects codecs (empty intersection fails
    /// the negotiation and transitions to `Failed`), dualizes direction,
    /// resolves ptime, builds the answer and transitions to `Established`.
    pub fn create_answer(
        &mut self,
        port: u16,
        rtcp_port: Option<u16>,
    ) -> Result<SessionDescription, Error> {
        if self.state != NegotiationState::RemoteOffer {
            return Err(Error::new(ErrorKind::WrongState("create_answer requires RemoteOffer")));
        }

        let offer = self.remote.as_ref().expect("RemoteOffer implies remote is set");
        let offer_media = offer
            .media_descriptions
            .first()
            .ok_or_else(|| Error::new(ErrorKind::SdpParse(empty_media_error())))?;

        let negotiated = match sdp_codec::intersect(offer_media, &self.local, self.default_ptime_ms) {
            Ok(n) => n,
            Err(_) => {
                self.state = NegotiationState::Failed;
                return Err(Error::new(ErrorKind::NoCommonCodec));
            }
        };

        self.session_version += 1;

        let answer_capabilities = LocalCapabilities {
            codecs: self
                .local
                .codecs
                .iter()
                .copied()
                .filter(|c| c.static_pt == Some(negotiated.payload_type))
                .collect(),
            dtmf_payload_type: negotiated.dtmf_payload_type,
        };

        let sdp = sdp_codec::build(&SdpBuildParams {
            host: self.host,
            port,
            rtcp_port,
            session_id: self.sdp_session_id,
            session_version: self.session_version,
            direction: negotiated.direction,
            ptime_ms: negotiated.ptime_ms,
            capabilities: answer_capabilities,
        });

        self.negotiated = Some(negotiated);
        self.state = NegotiationState::Established;
        Ok(sdp)
    }

    /// Requires `LocalOffer`. Validates the answered codec was one of the
    /// offered codecs; in strict mode a mismatch fails the negotiation.
    pub fn process_answer(&mut self, answer: SessionDescription) -> Result<(), Error> {
        if self.state != NegotiationState::LocalOffer {
            return Err(Error::new(ErrorKind::WrongState("process_answer requires LocalOffer")));
        }

        let answer_media = answer
            .media_descriptions
            .first()
            .ok_or_else(|| Error::new(ErrorKind::SdpParse(empty_media_error())))?;

        let answered_pt = answer_media
            .media
            .fmts
            .iter()
            .copied()
            .find(|&pt| crate::codec::by_payload_type(pt).is_some());

        let offered_ok = answered_pt
            .map(|pt| self.local.codecs.iter().any(|c| c.static_pt == Some(pt)))
            .unwrap_or(false);

        if !offered_ok && self.strict_answer {
            self.state = NegotiationState::Failed;
            return Err(Error::new(ErrorKind::NoCommonCodec));
        }

        let Some(payload_type) = answered_pt else {
            self.state = NegotiationState::Failed;
            return Err(Error::new(ErrorKind::NoCommonCodec));
        };

        let clock_rate = crate::codec::by_payload_type(payload_type)
            .map(|c| c.clock_rate)
            .unwrap_or(8000);

        let dtmf_payload_type = self.local.dtmf_payload_type.filter(|&pt| {
            answer_media
                .rtpmap(pt)
                .is_some_and(|r| r.encoding.eq_ignore_ascii_case("telephone-event"))
        });

        let direction = self
            .offered_direction
            .map(Direction::dual)
            .unwrap_or(Direction::SendRecv);

        self.negotiated = Some(Negotiated {
            payload_type,
            clock_rate,
            dtmf_payload_type,
            direction,
            ptime_ms: answer_media.ptime.unwrap_or(self.default_ptime_ms),
        });
        self.state = NegotiationState::Established;
        Ok(())
    }
}

fn empty_media_error() -> media_sdp::ParseSessionDescriptionError {
    media_sdp::ParseSessionDescriptionError::MissingField("m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn negotiator() -> Negotiator {
        Negotiator::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            LocalCapabilities::from_names(&["PCMU", "PCMA"], Some(101)),
            20,
            true,
        )
    }

    #[test]
    fn full_offer_answer_cycle_reaches_established() {
        let mut offerer = negotiator();
        let offer = offerer.create_offer(16000, None, Direction::SendRecv).unwrap();
        assert_eq!(offerer.state(), NegotiationState::LocalOffer);

        let mut answerer = negotiator();
        answerer.process_offer(offer).unwrap();
        assert_eq!(answerer.state(), NegotiationState::RemoteOffer);

        let answer = answerer.create_answer(17000, None).unwrap();
        assert_eq!(answerer.state(), NegotiationState::Established);

        offerer.process_answer(answer).unwrap();
        assert_eq!(offerer.state(), NegotiationState::Established);
        assert_eq!(
            offerer.negotiated().unwrap().payload_type,
            answerer.negotiated().unwrap().payload_type
        );
    }

    #[test]
    fn no_common_codec_fails_the_answerer() {
        let mut offerer = Negotiator::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            LocalCapabilities::from_names(&["G729"], None),
            20,
            true,
        );
        let offer = offerer.create_offer(16000, None, Direction::SendRecv).unwrap();

        let mut answerer = negotiator(); // only PCMU/PCMA
        answerer.process_offer(offer).unwrap();

        let err = answerer.create_answer(17000, None).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::NoCommonCodec));
        assert_eq!(answerer.state(), NegotiationState::Failed);
    }

    #[test]
    fn second_offer_while_remote_offer_overwrites_the_first() {
        let mut offerer_a = negotiator();
        let offer_a = offerer_a.create_offer(16000, None, Direction::SendOnly).unwrap();

        let mut offerer_b = negotiator();
        let offer_b = offerer_b.create_offer(16002, None, Direction::RecvOnly).unwrap();

        let mut answerer = negotiator();
        answerer.process_offer(offer_a).unwrap();
        answerer.process_offer(offer_b).unwrap(); // glare recovery: last wins
        assert_eq!(answerer.state(), NegotiationState::RemoteOffer);

        let answer = answerer.create_answer(17000, None).unwrap();
        assert_eq!(answer.media_descriptions[0].direction, media_sdp::Direction::SendOnly);
    }

    #[test]
    fn create_offer_requires_idle() {
        let mut negotiator = negotiator();
        negotiator.create_offer(16000, None, Direction::SendRecv).unwrap();
        assert!(matches!(
            negotiator.create_offer(16000, None, Direction::SendRecv),
            Err(Error { kind: ErrorKind::WrongState(_), .. })
        ));
    }
}
