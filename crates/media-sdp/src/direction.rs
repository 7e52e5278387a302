use std::fmt;
use std::str::FromStr;

/// Media direction attribute (`a=sendrecv` / `a=sendonly` / `a=recvonly` / `a=inactive`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-6.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    /// The dual of this direction as seen by the remote peer.
    ///
    /// `SendOnly` flips to `RecvOnly` and vice versa; `SendRecv` and
    /// `Inactive` are self-dual.
    pub fn flipped(self) -> Self {
        match self {
            Direction::SendRecv => Direction::SendRecv,
            Direction::SendOnly => Direction::RecvOnly,
            Direction::RecvOnly => Direction::SendOnly,
            Direction::Inactive => Direction::Inactive,
        }
    }

    pub fn can_send(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    pub fn can_recv(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid direction attribute {0:?}")]
pub struct InvalidDirectionError(String);

impl FromStr for Direction {
    type Err = InvalidDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendrecv" => Ok(Direction::SendRecv),
            "sendonly" => Ok(Direction::SendOnly),
            "recvonly" => Ok(Direction::RecvOnly),
            "inactive" => Ok(Direction::Inactive),
            _ => Err(InvalidDirectionError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_is_involution_except_dual_free() {
        for d in [
            Direction::SendRecv,
            Direction::SendOnly,
            Direction::RecvOnly,
            Direction::Inactive,
        ] {
            assert_eq!(d.flipped().flipped(), d);
        }
        assert_eq!(Direction::SendOnly.flipped(), Direction::RecvOnly);
        assert_eq!(Direction::RecvOnly.flipped(), Direction::SendOnly);
        assert_eq!(Direction::SendRecv.flipped(), Direction::SendRecv);
        assert_eq!(Direction::Inactive.flipped(), Direction::Inactive);
    }

    #[test]
    fn parse_and_display_round_trip() {
        for s in ["sendrecv", "sendonly", "recvonly", "inactive"] {
            let d: Direction = s.parse().unwrap();
            assert_eq!(d.to_string(), s);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("foo".parse::<Direction>().is_err());
    }
}
