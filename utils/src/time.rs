//! Time formatting helpers.

use lmnode_types::Timestamp;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// "5m 3s ago", or "never" for the epoch.
pub fn format_age(then: Timestamp, now: Timestamp) -> String {
    if then.is_epoch() {
        return "never".to_string();
    }
    format!("{} ago", format_duration(then.elapsed_since(now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_duration(2 * 86400 + 3600), "2d 1h");
    }

    #[test]
    fn ages() {
        let now = Timestamp::new(1_000);
        assert_eq!(format_age(Timestamp::EPOCH, now), "never");
        assert_eq!(format_age(Timestamp::new(940), now), "1m 0s ago");
    }
}
