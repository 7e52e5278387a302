//! RtpMap attribute (`a=rtpmap:<pt> <name>/<rate>[/<ch>]`)

use bytesstr::BytesStr;
use media_internal::{ws, IResult};
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::digit1;
use nom::combinator::{map, map_res, opt};
use nom::error::context;
use nom::sequence::{preceded, terminated, tuple};
use std::fmt;
use std::str::FromStr;

/// Rtpmap attribute (`a=rtpmap`)
///
/// Maps a RTP payload number to an encoding name, clock rate and optional
/// channel count.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub payload: u8,
    pub encoding: BytesStr,
    pub clock_rate: u32,
    pub channels: Option<u32>,
}

impl RtpMap {
    pub fn parse(i: &str) -> IResult<&str, Self> {
        context(
            "parsing rtpmap",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    ws((terminated(
                        map(take_while(|c| c != '/'), BytesStr::from),
                        tag("/"),
                    ),)),
                    map_res(digit1, FromStr::from_str),
                    opt(preceded(tag("/"), map_res(digit1, FromStr::from_str))),
                )),
                |(payload, (encoding,), clock_rate, channels)| RtpMap {
                    payload,
                    encoding,
                    clock_rate,
                    channels,
                },
            ),
        )(i)
    }
}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload, self.encoding, self.clock_rate)?;

        if let Some(channels) = self.channels {
            write!(f, "/{channels}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtpmap() {
        let (rem, rtpmap) = RtpMap::parse("0 PCMU/8000").unwrap();

        assert!(rem.is_empty());
        assert_eq!(rtpmap.payload, 0);
        assert_eq!(rtpmap.encoding, "PCMU");
        assert_eq!(rtpmap.clock_rate, 8000);
        assert_eq!(rtpmap.channels, None);
    }

    #[test]
    fn rtpmap_with_channels() {
        let (rem, rtpmap) = RtpMap::parse("101 telephone-event/8000/1").unwrap();

        assert!(rem.is_empty());
        assert_eq!(rtpmap.payload, 101);
        assert_eq!(rtpmap.encoding, "telephone-event");
        assert_eq!(rtpmap.clock_rate, 8000);
        assert_eq!(rtpmap.channels, Some(1));
    }

    #[test]
    fn rtpmap_print_round_trips() {
        let rtpmap = RtpMap {
            payload: 0,
            encoding: "PCMU".into(),
            clock_rate: 8000,
            channels: None,
        };

        assert_eq!(rtpmap.to_string(), "0 PCMU/8000");

        let (_, reparsed) = RtpMap::parse(&rtpmap.to_string()).unwrap();
        assert_eq!(reparsed, rtpmap);
    }
}
