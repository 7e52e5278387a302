/// Sendrecv/sendonly/recvonly/inactive role of a media stream, from one
/// endpoint's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn can_send(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }

    /// The direction the peer sees for the same stream: `SendOnly` and
    /// `RecvOnly` swap, `SendRecv`/`Inactive` are self-dual.
    pub fn dual(self) -> Direction {
        match self {
            Direction::SendRecv => Direction::SendRecv,
            Direction::SendOnly => Direction::RecvOnly,
            Direction::RecvOnly => Direction::SendOnly,
            Direction::Inactive => Direction::Inactive,
        }
    }
}

impl From<media_sdp::Direction> for Direction {
    fn from(d: media_sdp::Direction) -> Self {
        match d {
            media_sdp::Direction::SendRecv => Direction::SendRecv,
            media_sdp::Direction::SendOnly => Direction::SendOnly,
            media_sdp::Direction::RecvOnly => Direction::RecvOnly,
            media_sdp::Direction::Inactive => Direction::Inactive,
        }
    }
}

impl From<Direction> for media_sdp::Direction {
    fn from(d: Direction) -> Self {
        match d {
            Direction::SendRecv => media_sdp::Direction::SendRecv,
            Direction::SendOnly => media_sdp::Direction::SendOnly,
            Direction::RecvOnly => media_sdp::Direction::RecvOnly,
            Direction::Inactive => media_sdp::Direction::Inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_swaps_send_and_recv_only() {
        assert_eq!(Direction::SendOnly.dual(), Direction::RecvOnly);
        assert_eq!(Direction::RecvOnly.dual(), Direction::SendOnly);
        assert_eq!(Direction::SendRecv.dual(), Direction::SendRecv);
        assert_eq!(Direction::Inactive.dual(), Direction::Inactive);
    }
}
