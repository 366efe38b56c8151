use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A point in time stored as integer ticks: milliseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    pub const fn ticks(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Calendar date at midnight UTC.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, CoreError> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            CoreError::InvalidTimestamp(format!("{year:04}-{month:02}-{day:02}"))
        })?;
        Ok(Self::from_naive(date.and_hms_opt(0, 0, 0).unwrap_or_default()))
    }

    fn from_naive(value: NaiveDateTime) -> Self {
        Self(value.and_utc().timestamp_millis())
    }

    /// Accepts RFC 3339 (`2024-03-01T10:00:00Z`), a naive date-time
    /// (`2024-03-01T10:00:00`) or a bare date (`2024-03-01`).
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Self::from_naive(dt));
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Self::from_naive(dt));
        }
        Err(CoreError::InvalidTimestamp(raw.to_string()))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "Timestamp({})", dt.to_rfc3339()),
            None => write!(f, "Timestamp({}ms)", self.0),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_date_as_midnight_utc() {
        let ts = Timestamp::parse("1970-01-02").unwrap();
        assert_eq!(ts.ticks(), 86_400_000);
        assert_eq!(ts, Timestamp::from_ymd(1970, 1, 2).unwrap());
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = Timestamp::parse("1970-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts.ticks(), 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
        assert!(Timestamp::from_ymd(2023, 2, 30).is_err());
    }
}
