use std::ops::Sub;
use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime};
use time::ext::InstantExt;
use time::{Date, Duration as SignedDuration, Month, OffsetDateTime};

static SYSTEM_TIME_TO_INSTANT: LazyLock<(SystemTime, Instant)> = LazyLock::new(|| {
    let time = SystemTime::now();
    let instant = Instant::now();

    (time, instant)
});

const NTP_EPOCH: OffsetDateTime = const {
    let date = match Date::from_calendar_date(1900, Month::January, 1) {
        Ok(date) => date,
        Err(_e) => panic!("invalid date"),
    };

    OffsetDateTime::new_utc(date, time::Time::MIDNIGHT)
};

/// NTP timestamp (seconds since 1900-01-01), correlated from a monotonic
/// [`Instant`] via a one-time `SystemTime`/`Instant` sample taken at first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtpTimestamp {
    inner: SignedDuration,
}

impl NtpTimestamp {
    pub fn from_instant(now: Instant) -> Self {
        let (ref_time, ref_instant) = &*SYSTEM_TIME_TO_INSTANT;
        let system_time = *ref_time + now.signed_duration_since(*ref_instant);

        Self {
            inner: system_time - NTP_EPOCH,
        }
    }

    pub fn as_seconds_f64(self) -> f64 {
        self.inner.as_seconds_f64()
    }

    /// Full 64-bit NTP fixed-point representation (32.32).
    pub fn to_fixed_u64(self) -> u64 {
        let seconds = self.inner.whole_seconds() as u64;

        let subseconds = self.inner.as_seconds_f64().fract() * u32::MAX as f64;
        let subseconds = subseconds as u64;

        (seconds << 32) | subseconds
    }

    /// Middle 32 bits of [`to_fixed_u64`](Self::to_fixed_u64), as carried in
    /// the "last SR" field of a receiver report.
    pub fn to_fixed_u32(self) -> u32 {
        ((self.to_fixed_u64() >> 16) & u64::from(u32::MAX)) as u32
    }

    pub fn from_fixed_u32(fixed: u32) -> Self {
        let seconds = (fixed >> 16) as i64;

        let subseconds = (fixed & u32::from(u16::MAX)) as u16;
        let subseconds = subseconds as f64 / (u16::MAX as f64);

        Self {
            inner: SignedDuration::new(seconds, (subseconds * 1_000_000_000.) as i32),
        }
    }

    pub fn to_std_duration(self) -> Option<Duration> {
        self.inner.try_into().ok()
    }
}

impl Sub for NtpTimestamp {
    type Output = NtpTimestamp;

    fn sub(self, rhs: Self) -> Self::Output {
        NtpTimestamp {
            inner: self.inner - rhs.inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_u32_round_trips_within_lsr_resolution() {
        let now = NtpTimestamp::from_instant(Instant::now());
        let fixed = now.to_fixed_u32();
        let reparsed = NtpTimestamp::from_fixed_u32(fixed);

        // to_fixed_u32 only keeps the middle 32 bits, so seconds wrap mod 2^16.
        assert!((reparsed.as_seconds_f64() - (now.as_seconds_f64() % 65536.0)).abs() < 1.0);
    }
}
