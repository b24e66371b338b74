//! Windows FILETIME conversion
//!
//! NTFS stores every timestamp as 100-nanosecond ticks since 1601-01-01 UTC.

use crate::error::{MftError, Result};
use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone};
use serde::Serialize;

/// Seconds between 1601-01-01 and 1970-01-01
pub const EPOCH_DELTA_SECONDS: i64 = 11_644_473_600;

/// FILETIME ticks per second
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// 9999-12-31T23:59:59Z, the last second we render
const MAX_UNIX_SECONDS: i64 = 253_402_300_799;

/// A decoded FILETIME, relative to the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WindowsTimestamp {
    /// Raw on-disk tick value
    ticks: u64,
    unix_seconds: i64,
    nanos: u32,
    /// Display offset; zero unless local time was requested
    utc_offset_seconds: i32,
    sentinel: bool,
}

impl WindowsTimestamp {
    /// Substituted for ticks that cannot be represented. Points at the 1601
    /// epoch, the smallest instant a FILETIME can name.
    pub const SENTINEL: Self = Self {
        ticks: 0,
        unix_seconds: -EPOCH_DELTA_SECONDS,
        nanos: 0,
        utc_offset_seconds: 0,
        sentinel: true,
    };

    /// Convert ticks, reporting out-of-range values as an error
    pub fn try_from_ticks(ticks: u64, local: bool) -> Result<Self> {
        if ticks == 0 {
            return Err(MftError::TimestampOutOfRange(ticks));
        }

        let whole = (ticks / TICKS_PER_SECOND) as i64;
        let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
        let unix_seconds = whole - EPOCH_DELTA_SECONDS;

        if unix_seconds > MAX_UNIX_SECONDS {
            return Err(MftError::TimestampOutOfRange(ticks));
        }

        let utc_offset_seconds = if local {
            Local
                .timestamp_opt(unix_seconds, nanos)
                .single()
                .map(|dt| dt.offset().fix().local_minus_utc())
                .unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            ticks,
            unix_seconds,
            nanos,
            utc_offset_seconds,
            sentinel: false,
        })
    }

    /// Convert ticks, substituting the sentinel for out-of-range values
    pub fn from_ticks(ticks: u64, local: bool) -> Self {
        Self::try_from_ticks(ticks, local).unwrap_or(Self {
            ticks,
            ..Self::SENTINEL
        })
    }

    /// Raw on-disk tick value
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whole seconds since 1970-01-01 UTC
    pub fn unix_seconds(&self) -> i64 {
        self.unix_seconds
    }

    /// Fractional part in nanoseconds (always a multiple of 100)
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Seconds since the Unix epoch as a float
    pub fn unix_time(&self) -> f64 {
        self.unix_seconds as f64 + self.nanos as f64 / 1e9
    }

    /// True if the raw value could not be represented
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    /// True when the sub-second component is exactly zero. Timestamps written
    /// by tools with one-second granularity look like this.
    pub fn has_zero_subsecond(&self) -> bool {
        self.nanos == 0
    }

    /// Calendar form in the display offset, `None` for sentinels
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        if self.sentinel {
            return None;
        }
        let offset = FixedOffset::east_opt(self.utc_offset_seconds)?;
        offset.timestamp_opt(self.unix_seconds, self.nanos).single()
    }
}

impl std::fmt::Display for WindowsTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(
                f,
                "{}.{:07}{}",
                dt.format("%Y-%m-%d %H:%M:%S"),
                self.nanos / 100,
                dt.format("%:z")
            ),
            None => write!(f, "Not defined"),
        }
    }
}
