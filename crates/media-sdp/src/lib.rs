//! SDP (RFC 8866) types, parser and serializer, restricted to the
//! single-audio-stream RTP/AVP profile negotiated by the softphone media
//! core: one `m=audio` section, `sendrecv`/`sendonly`/`recvonly`/`inactive`
//! direction, static and dynamic PCM payload types plus RFC 4733
//! telephone-event, no ICE/SRTP/video.
#![warn(unreachable_pub)]

mod attributes;
mod connection;
mod direction;
mod media;
mod media_description;
mod origin;
mod parser;
mod session_description;
mod time;

pub use attributes::{Fmtp, Rtcp, RtpMap, SourceAttribute};
pub use connection::{Connection, InvalidConnectionError};
pub use direction::{Direction, InvalidDirectionError};
pub use media::{InvalidMediaError, Media, MediaType, TransportProtocol, UnsupportedTransportProtocolError};
pub use media_description::MediaDescription;
pub use origin::{InvalidOriginError, Origin};
pub use parser::{parse, ParseSessionDescriptionError};
pub use session_description::SessionDescription;
pub use time::{InvalidTimeError, Time};
