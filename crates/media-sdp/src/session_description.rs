use crate::connection::Connection;
use crate::media_description::MediaDescription;
use crate::origin::Origin;
use crate::time::Time;
use bytesstr::BytesStr;
use std::fmt;

/// A parsed SDP session description, restricted to the fields this crate's
/// audio/RTP profile negotiates.
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5)
#[derive(Debug, Clone)]
pub struct SessionDescription {
    pub origin: Origin,
    pub session_name: BytesStr,
    pub connection: Option<Connection>,
    pub time: Time,
    pub media_descriptions: Vec<MediaDescription>,
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v=0\r\n")?;
        write!(f, "o={}\r\n", self.origin)?;
        write!(f, "s={}\r\n", self.session_name)?;

        if let Some(conn) = &self.connection {
            write!(f, "c={conn}\r\n")?;
        }

        write!(f, "t={}\r\n", self.time)?;

        for media in &self.media_descriptions {
            write!(f, "{media}")?;
        }

        Ok(())
    }
}
