//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC timestamp at millisecond precision
///
/// Stored timestamps are truncated so a value read back from the database
/// compares equal to the one written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_has_millisecond_precision() {
        let timestamp = now();
        assert_eq!(timestamp.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 1_700_000_000); // 2023-11-14
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }
}
