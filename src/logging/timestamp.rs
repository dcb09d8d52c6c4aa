//! ISO 8601 timestamps for log lines: `2024-01-15T10:30:00.123Z`.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock instant rendered as UTC with millisecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(SystemTime);

impl Timestamp {
    #[inline]
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    #[inline]
    pub fn from_system_time(time: SystemTime) -> Self {
        Self(time)
    }

    #[inline]
    pub fn system_time(&self) -> SystemTime {
        self.0
    }

    /// Time since the epoch; zero for instants before it.
    #[inline]
    fn since_epoch(&self) -> Duration {
        self.0.duration_since(UNIX_EPOCH).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let since = self.since_epoch();
        let secs = since.as_secs();
        let day_secs = secs % 86_400;
        let (year, month, day) = civil_from_days((secs / 86_400) as i64);

        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            year,
            month,
            day,
            day_secs / 3600,
            (day_secs % 3600) / 60,
            day_secs % 60,
            since.subsec_millis()
        )
    }
}

/// Convert days since 1970-01-01 into a (year, month, day) civil date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
