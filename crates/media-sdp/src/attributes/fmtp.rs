//! Fmtp attribute (`a=fmtp:<pt> <params>`)

use bytesstr::BytesStr;
use media_internal::IResult;
use nom::bytes::complete::take_while1;
use nom::character::complete::{digit1, space0};
use nom::combinator::{map, map_res};
use nom::error::context;
use nom::sequence::{preceded, tuple};
use std::fmt;
use std::str::FromStr;

/// Format parameters attribute (`a=fmtp`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fmtp {
    pub format: u8,
    pub params: BytesStr,
}

impl Fmtp {
    pub fn parse(i: &str) -> IResult<&str, Self> {
        context(
            "parsing fmtp",
            map(
                tuple((
                    map_res(digit1, FromStr::from_str),
                    preceded(space0, map(take_while1(|_| true), BytesStr::from)),
                )),
                |(format, params)| Fmtp { format, params },
            ),
        )(i)
    }

    /// `0-15` is the canonical telephone-event fmtp this profile emits.
    pub fn telephone_event(format: u8) -> Self {
        Fmtp {
            format,
            params: "0-15".into(),
        }
    }
}

impl fmt::Display for Fmtp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.format, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmtp_telephone_event() {
        let (rem, fmtp) = Fmtp::parse("101 0-15").unwrap();
        assert!(rem.is_empty());
        assert_eq!(fmtp.format, 101);
        assert_eq!(fmtp.params, "0-15");
    }

    #[test]
    fn fmtp_display() {
        assert_eq!(Fmtp::telephone_event(101).to_string(), "101 0-15");
    }
}
