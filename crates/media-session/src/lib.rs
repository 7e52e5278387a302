//! Per-call media engine for a softphone: SDP offer/answer negotiation,
//! RTP/RTCP port allocation and transport, and the send/receive data path
//! for one audio stream (packetization, jitter buffering, RFC 4733 DTMF,
//! RTCP reporting).
//!
//! [`SessionManager`] is the external entry point: it owns the set of
//! active [`MediaSession`]s, coordinates [`PortAllocator`] and
//! [`Negotiator`], and evicts idle sessions.
#![warn(unreachable_pub)]

mod codec;
mod direction;
mod error;
mod media_session;
mod negotiator;
mod port_allocator;
mod rtp_stream;
mod sdp_codec;
mod session_manager;
mod statistics;
mod transport;

pub use codec::{by_name, by_payload_type, Codec, STATIC_CODECS};
pub use direction::Direction;
pub use error::{Error, ErrorKind, NotFoundKind};
pub use media_session::{
    MediaSession, MediaSessionConfig, MediaSessionObserver, MediaSessionState, NullObserver,
};
pub use negotiator::{NegotiationState, Negotiator};
pub use port_allocator::{PortAllocator, PortPair, PortRange};
pub use rtp_stream::RtpStream;
pub use sdp_codec::{build as build_sdp, intersect, IntersectError, LocalCapabilities, Negotiated, SdpBuildParams};
pub use session_manager::{EventHandler, ManagerConfig, NullEventHandler, SessionManager};
pub use statistics::Statistics;
pub use transport::Transport;
