//! Utility functions for orion

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render a millisecond timestamp as RFC 3339
pub fn format_timestamp_millis(millis: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_monotone_enough() {
        let a = timestamp_now_millis();
        let b = timestamp_now_millis();
        assert!(a > 1_500_000_000_000);
        assert!(b >= a);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp_millis(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(
            format_timestamp_millis(1_500_000_000_123),
            "2017-07-14T02:40:00.123+00:00"
        );
    }
}
