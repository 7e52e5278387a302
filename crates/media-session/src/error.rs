use std::time::Duration;

/// Crate-wide error type. Carries the session id the failing operation was
/// scoped to, when there was one, alongside the specific failure kind.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub session_id: Option<String>,
    #[source]
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        Error {
            session_id: None,
            kind: kind.into(),
        }
    }

    pub fn with_session(session_id: impl Into<String>, kind: impl Into<ErrorKind>) -> Self {
        Error {
            session_id: Some(session_id.into()),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("manager is at capacity ({max_sessions} sessions)")]
    CapacityExceeded { max_sessions: usize },
    #[error("session id {0:?} already exists")]
    DuplicateSessionId(String),
    #[error("{0} not found")]
    NotFound(NotFoundKind),
    #[error("no bindable port pair available in the configured range")]
    PortExhausted,
    #[error("failed to bind port {port}")]
    BindFailed { port: u16 },
    #[error(transparent)]
    SdpParse(#[from] media_sdp::ParseSessionDescriptionError),
    #[error("no codec in common between offer and local capabilities")]
    NoCommonCodec,
    #[error("operation requires a different state: {0}")]
    WrongState(&'static str),
    #[error("send attempted on a stream with direction {0:?}")]
    WrongDirection(crate::Direction),
    #[error("transport I/O error: {0}")]
    TransportIo(String),
    #[error("transport closed")]
    TransportClosed,
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed RTP packet: {0}")]
    MalformedRtp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Session,
    MediaTag,
    Port,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NotFoundKind::Session => "session",
            NotFoundKind::MediaTag => "media tag",
            NotFoundKind::Port => "port",
        })
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::TransportIo(e.to_string())
    }
}
