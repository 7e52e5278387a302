//! Ssrc attribute (`a=ssrc:<id> cname:<cname>`)

use bytesstr::BytesStr;
use media_internal::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{digit1, space1};
use nom::combinator::{map, map_res, opt};
use nom::error::context;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// Source-level attribute (`a=ssrc`), restricted to the `cname` attribute
/// used to correlate RTP/RTCP sources with SDES.
///
/// [RFC5576](https://www.rfc-editor.org/rfc/rfc5576.html)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAttribute {
    pub ssrc: u32,
    pub cname: Option<BytesStr>,
}

impl SourceAttribute {
    pub fn parse(i: &str) -> IResult<&str, Self> {
        context(
            "parsing ssrc",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    opt(preceded(
                        tuple((space1, tag("cname:"))),
                        alt((
                            map(take_while1(|c: char| !c.is_whitespace()), BytesStr::from),
                            map(tag(""), BytesStr::from),
                        )),
                    )),
                )),
                |(ssrc, cname)| SourceAttribute { ssrc, cname },
            ),
        )(i)
    }
}

impl fmt::Display for SourceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ssrc)?;

        if let Some(cname) = &self.cname {
            write!(f, " cname:{cname}")?;
        }

        Ok(())
    }
}
