use bytesstr::BytesStr;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Origin field (`o=`)
///
/// [RFC8866](https://www.rfc-editor.org/rfc/rfc8866.html#section-5.2)
#[derive(Debug, Clone)]
pub struct Origin {
    pub username: BytesStr,
    pub session_id: u64,
    pub session_version: u64,
    pub address: IpAddr,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let addrtype = if self.address.is_ipv4() { "IP4" } else { "IP6" };
        write!(
            f,
            "{} {} {} IN {} {}",
            self.username, self.session_id, self.session_version, addrtype, self.address
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid origin field {0:?}")]
pub struct InvalidOriginError(String);

impl FromStr for Origin {
    type Err = InvalidOriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidOriginError(s.to_owned());

        let mut parts = s.splitn(6, ' ');

        let username = BytesStr::from(parts.next().ok_or_else(err)?);
        let session_id = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let session_version = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let _nettype = parts.next().ok_or_else(err)?;
        let _addrtype = parts.next().ok_or_else(err)?;
        let address = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

        Ok(Origin {
            username,
            session_id,
            session_version,
            address,
        })
    }
}
