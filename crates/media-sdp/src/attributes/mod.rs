mod fmtp;
mod rtcp;
mod rtpmap;
mod ssrc;

pub use fmtp::Fmtp;
pub use rtcp::Rtcp;
pub use rtpmap::RtpMap;
pub use ssrc::SourceAttribute;
