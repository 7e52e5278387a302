use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Connection field (`c=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.7)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub address: IpAddr,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let addrtype = if self.address.is_ipv4() { "IP4" } else { "IP6" };
        write!(f, "IN {} {}", addrtype, self.address)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid connection field {0:?}")]
pub struct InvalidConnectionError(String);

impl FromStr for Connection {
    type Err = InvalidConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidConnectionError(s.to_owned());

        let mut parts = s.split(' ');

        let _nettype = parts.next().ok_or_else(err)?;
        let _addrtype = parts.next().ok_or_else(err)?;
        let address = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

        Ok(Connection { address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let line = "IN IP4 10.0.0.1";
        let conn: Connection = line.parse().unwrap();
        assert_eq!(conn.to_string(), line);
    }
}
