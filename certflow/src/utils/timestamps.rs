//! Timestamp helpers.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp, truncated to microseconds.
///
/// Stored timestamps never carry more precision than a cursor can encode.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now().trunc_subsecs(6)
}

/// Converts a timestamp to microseconds since the Unix epoch.
#[must_use]
pub fn to_unix_micros(dt: &Timestamp) -> i64 {
    dt.timestamp_micros()
}

/// Builds a timestamp from microseconds since the Unix epoch.
///
/// Returns `None` when the value is out of chrono's representable range.
#[must_use]
pub fn from_unix_micros(micros: i64) -> Option<Timestamp> {
    Utc.timestamp_micros(micros).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_micros_round_trip_preserves_precision() {
        let now = now_utc();
        let micros = to_unix_micros(&now);
        let back = from_unix_micros(micros).unwrap();
        assert_eq!(back, now);
    }

    #[test]
    fn test_now_has_microsecond_precision() {
        let now = now_utc();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_out_of_range_micros() {
        assert!(from_unix_micros(i64::MAX).is_none());
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(from_unix_micros(to_unix_micros(&dt)), Some(dt));
    }
}
