//! Canonical time representation: all timestamps are epoch seconds.

use chrono::Utc;

/// Current time as epoch seconds. Stored as-is and serialized as a JSON
/// integer at the boundary.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_epoch_is_recent() {
        // 2024-01-01 as a floor; guards against unit confusion (ms vs s).
        let now = now_epoch();
        assert!(now > 1_704_067_200);
        assert!(now < 10_000_000_000);
    }
}
