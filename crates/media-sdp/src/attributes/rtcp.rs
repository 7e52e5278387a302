//! Rtcp attribute (`a=rtcp:<port>`)

use media_internal::IResult;
use nom::character::complete::digit1;
use nom::combinator::{map, map_res};
use nom::error::context;
use std::fmt;
use std::str::FromStr;

/// `a=rtcp` attribute carrying the port RTCP is received on, when it
/// differs from `RTP port + 1`.
///
/// [RFC3605](https://www.rfc-editor.org/rfc/rfc3605.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rtcp {
    pub port: u16,
}

impl Rtcp {
    pub fn parse(i: &str) -> IResult<&str, Self> {
        context(
            "parsing rtcp",
            map(map_res(digit1, FromStr::from_str), |port| Rtcp { port }),
        )(i)
    }
}

impl fmt::Display for Rtcp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.port)
    }
}
