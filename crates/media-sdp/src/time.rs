use std::fmt;
use std::str::FromStr;

/// Timing field (`t=`). This profile only ever emits/accepts `t=0 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub start: u64,
    pub stop: u64,
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.start, self.stop)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid time field {0:?}")]
pub struct InvalidTimeError(String);

impl FromStr for Time {
    type Err = InvalidTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidTimeError(s.to_owned());

        let mut parts = s.split(' ');

        let start = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
        let stop = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;

        Ok(Time { start, stop })
    }
}
