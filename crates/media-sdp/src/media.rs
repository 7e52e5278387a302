use std::fmt;
use std::str::FromStr;

/// Media type of a media description (`m=<media> ...`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Other(String),
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaType::Audio => f.write_str("audio"),
            MediaType::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for MediaType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "audio" => MediaType::Audio,
            other => MediaType::Other(other.to_owned()),
        })
    }
}

/// Transport protocol of a media description. This profile only supports
/// plain RTP/AVP (unencrypted, no AVPF feedback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    RtpAvp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("RTP/AVP")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported media transport protocol {0:?}")]
pub struct UnsupportedTransportProtocolError(pub String);

impl FromStr for TransportProtocol {
    type Err = UnsupportedTransportProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RTP/AVP" => Ok(TransportProtocol::RtpAvp),
            other => Err(UnsupportedTransportProtocolError(other.to_owned())),
        }
    }
}

/// Media field (`m=`)
#[derive(Debug, Clone)]
pub struct Media {
    pub media_type: MediaType,
    pub port: u16,
    pub proto: TransportProtocol,
    pub fmts: Vec<u8>,
}

impl fmt::Display for Media {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.media_type, self.port, self.proto)?;

        for fmt_ in &self.fmts {
            write!(f, " {fmt_}")?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidMediaError {
    #[error("malformed m= line {0:?}")]
    Malformed(String),
    #[error(transparent)]
    Protocol(#[from] UnsupportedTransportProtocolError),
}

impl FromStr for Media {
    type Err = InvalidMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InvalidMediaError::Malformed(s.to_owned());

        let mut parts = s.split(' ');

        let media_type = parts.next().ok_or_else(malformed)?.parse().unwrap();
        let port = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
        let proto: TransportProtocol = parts.next().ok_or_else(malformed)?.parse()?;

        let fmts = parts
            .map(|fmt_| fmt_.parse().map_err(|_| malformed()))
            .collect::<Result<Vec<u8>, _>>()?;

        Ok(Media {
            media_type,
            port,
            proto,
            fmts,
        })
    }
}
