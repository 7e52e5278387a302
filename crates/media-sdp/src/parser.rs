//! Top-level SDP parser.
//!
//! This profile is line-oriented rather than grammar-driven: each `a=`
//! attribute is dispatched to the parser of [`crate::attributes`] that
//! understands it, everything else is a plain `key=value` split.

use crate::attributes::{Fmtp, Rtcp, RtpMap, SourceAttribute};
use crate::connection::Connection;
use crate::direction::Direction;
use crate::media::Media;
use crate::media_description::MediaDescription;
use crate::origin::Origin;
use crate::session_description::SessionDescription;
use crate::time::Time;
use bytesstr::BytesStr;

#[derive(Debug, thiserror::Error)]
pub enum ParseSessionDescriptionError {
    #[error("missing mandatory {0}= field")]
    MissingField(&'static str),
    #[error("malformed {field}= line {line:?}: {source}")]
    Malformed {
        field: &'static str,
        line: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("media description has no m= line before a= attributes")]
    AttributeBeforeMedia,
}

fn malformed<E>(field: &'static str, line: &str, source: E) -> ParseSessionDescriptionError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ParseSessionDescriptionError::Malformed {
        field,
        line: line.to_owned(),
        source: Box::new(source),
    }
}

struct PartialMediaDescription {
    media: Media,
    connection: Option<Connection>,
    direction: Direction,
    rtcp: Option<Rtcp>,
    ptime: Option<u32>,
    rtpmap: Vec<RtpMap>,
    fmtp: Vec<Fmtp>,
    ssrc: Vec<SourceAttribute>,
}

impl PartialMediaDescription {
    fn new(media: Media) -> Self {
        Self {
            media,
            connection: None,
            direction: Direction::SendRecv,
            rtcp: None,
            ptime: None,
            rtpmap: Vec::new(),
            fmtp: Vec::new(),
            ssrc: Vec::new(),
        }
    }

    fn finish(self) -> MediaDescription {
        MediaDescription {
            media: self.media,
            connection: self.connection,
            direction: self.direction,
            rtcp: self.rtcp,
            ptime: self.ptime,
            rtpmap: self.rtpmap,
            fmtp: self.fmtp,
            ssrc: self.ssrc,
        }
    }

    fn add_attribute(&mut self, line: &str) -> Result<(), ParseSessionDescriptionError> {
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, Some(value)),
            None => (line, None),
        };

        match (name, value) {
            ("sendrecv", None) => self.direction = Direction::SendRecv,
            ("sendonly", None) => self.direction = Direction::SendOnly,
            ("recvonly", None) => self.direction = Direction::RecvOnly,
            ("inactive", None) => self.direction = Direction::Inactive,
            ("rtcp", Some(v)) => {
                let (_, rtcp) = Rtcp::parse(v).map_err(|e| malformed_nom("rtcp", line, e))?;
                self.rtcp = Some(rtcp);
            }
            ("ptime", Some(v)) => {
                self.ptime = Some(v.parse().map_err(|e| malformed("ptime", line, PtimeError(e)))?);
            }
            ("rtpmap", Some(v)) => {
                let (_, rtpmap) =
                    RtpMap::parse(v).map_err(|e| malformed_nom("rtpmap", line, e))?;
                self.rtpmap.push(rtpmap);
            }
            ("fmtp", Some(v)) => {
                let (_, fmtp) = Fmtp::parse(v).map_err(|e| malformed_nom("fmtp", line, e))?;
                self.fmtp.push(fmtp);
            }
            ("ssrc", Some(v)) => {
                let (_, ssrc) =
                    SourceAttribute::parse(v).map_err(|e| malformed_nom("ssrc", line, e))?;
                self.ssrc.push(ssrc);
            }
            // Unknown attributes (e.g. a=maxptime) are ignored rather than rejected,
            // matching the permissive-receiver stance of the rest of this profile.
            _ => {}
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid integer: {0}")]
struct PtimeError(std::num::ParseIntError);

fn malformed_nom(
    field: &'static str,
    line: &str,
    err: nom::Err<nom::error::VerboseError<&str>>,
) -> ParseSessionDescriptionError {
    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct NomError(String);

    malformed(field, line, NomError(err.to_string()))
}

/// Parse a complete SDP message body.
pub fn parse(input: &str) -> Result<SessionDescription, ParseSessionDescriptionError> {
    let mut origin = None;
    let mut session_name = None;
    let mut connection = None;
    let mut time = None;

    let mut media_descriptions = Vec::new();
    let mut current: Option<PartialMediaDescription> = None;

    for raw_line in input.lines() {
        let line = raw_line.trim_end_matches('\r');

        if line.is_empty() {
            continue;
        }

        let Some((field, value)) = line.split_once('=') else {
            continue;
        };

        match field {
            "v" => {}
            "o" => {
                origin = Some(
                    value
                        .parse::<Origin>()
                        .map_err(|e| malformed("o", line, e))?,
                );
            }
            "s" => session_name = Some(BytesStr::from(value)),
            "c" => {
                let conn = value
                    .parse::<Connection>()
                    .map_err(|e| malformed("c", line, e))?;
                match &mut current {
                    Some(media) => media.connection = Some(conn),
                    None => connection = Some(conn),
                }
            }
            "t" => {
                time = Some(
                    value
                        .parse::<Time>()
                        .map_err(|e| malformed("t", line, e))?,
                );
            }
            "m" => {
                if let Some(media) = current.take() {
                    media_descriptions.push(media.finish());
                }
                current = Some(PartialMediaDescription::new(
                    value.parse::<Media>().map_err(|e| malformed("m", line, e))?,
                ));
            }
            "a" => match &mut current {
                Some(media) => media.add_attribute(value)?,
                None => return Err(ParseSessionDescriptionError::AttributeBeforeMedia),
            },
            // b=, other session/media fields this profile doesn't negotiate
            _ => {}
        }
    }

    if let Some(media) = current.take() {
        media_descriptions.push(media.finish());
    }

    Ok(SessionDescription {
        origin: origin.ok_or(ParseSessionDescriptionError::MissingField("o"))?,
        session_name: session_name.ok_or(ParseSessionDescriptionError::MissingField("s"))?,
        connection,
        time: time.unwrap_or_default(),
        media_descriptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "\
v=0\r
o=alice 2890844526 2890844526 IN IP4 10.0.0.1\r
s=-\r
c=IN IP4 10.0.0.1\r
t=0 0\r
m=audio 49170 RTP/AVP 0 101\r
a=sendrecv\r
a=rtpmap:0 PCMU/8000\r
a=rtpmap:101 telephone-event/8000\r
a=fmtp:101 0-15\r
";

    #[test]
    fn parses_offer() {
        let sdp = parse(OFFER).unwrap();

        assert_eq!(sdp.origin.username, "alice");
        assert_eq!(sdp.session_name, "-");
        assert_eq!(sdp.connection.unwrap().address.to_string(), "10.0.0.1");
        assert_eq!(sdp.media_descriptions.len(), 1);

        let media = &sdp.media_descriptions[0];
        assert_eq!(media.media.fmts, vec![0, 101]);
        assert_eq!(media.direction, Direction::SendRecv);
        assert_eq!(media.rtpmap(0).unwrap().encoding, "PCMU");
        assert_eq!(media.rtpmap(101).unwrap().encoding, "telephone-event");
        assert_eq!(media.fmtp(101).unwrap().params, "0-15");
    }

    #[test]
    fn print_and_reparse_round_trips() {
        let sdp = parse(OFFER).unwrap();
        let printed = sdp.to_string();
        let reparsed = parse(&printed).unwrap();

        assert_eq!(reparsed.media_descriptions.len(), sdp.media_descriptions.len());
        assert_eq!(reparsed.origin.username, sdp.origin.username);
    }

    #[test]
    fn rejects_missing_origin() {
        let err = parse("v=0\r\ns=-\r\nt=0 0\r\n").unwrap_err();
        assert!(matches!(
            err,
            ParseSessionDescriptionError::MissingField("o")
        ));
    }

    #[test]
    fn rejects_attribute_before_media() {
        let err = parse("v=0\r\no=alice 1 1 IN IP4 10.0.0.1\r\ns=-\r\nt=0 0\r\na=sendrecv\r\n")
            .unwrap_err();
        assert!(matches!(
            err,
            ParseSessionDescriptionError::AttributeBeforeMedia
        ));
    }
}
