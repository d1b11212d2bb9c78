//! Wall-clock timestamps carried through `Value`.
//!
//! Stored as microseconds since the Unix epoch, UTC. Text form is
//! `YYYY-MM-DD HH:MM:SS` with an optional fractional part. Calendar math
//! is delegated to `chrono`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MICROS_PER_SECOND: i64 = 1_000_000;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A UTC instant with microsecond precision.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The zero instant, the value of `Timestamp::default()`.
    pub const ZERO: Self = Self(0);

    /// Bound in place of a zero timestamp: `1970-01-01 00:00:01`.
    ///
    /// Strict-mode MySQL rejects `0000-00-00`/epoch-zero datetimes, so unset
    /// timestamps never reach the backend as zero.
    pub const ZERO_SENTINEL: Self = Self(MICROS_PER_SECOND);

    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Saturates at the `i64` microsecond range.
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(MICROS_PER_SECOND))
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp_micros())
    }

    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The value to bind as a statement parameter.
    #[must_use]
    pub const fn for_binding(self) -> Self {
        if self.is_zero() {
            Self::ZERO_SENTINEL
        } else {
            self
        }
    }

    /// Parse `YYYY-MM-DD HH:MM:SS[.ffffff]`. A `T` separator, a trailing `Z`
    /// and a bare date are accepted. Out-of-range dates yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_suffix('Z').unwrap_or(text);

        let naive = DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })?;

        Some(Self(naive.and_utc().timestamp_micros()))
    }

    fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(dt) = self.to_datetime() else {
            return write!(f, "{}us", self.0);
        };
        write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))?;
        let micros = dt.timestamp_subsec_micros();
        if micros != 0 {
            write!(f, ".{micros:06}")?;
        }
        Ok(())
    }
}
