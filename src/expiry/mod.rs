// Expiry tracking and warning thresholds
use chrono::{DateTime, Utc};

/// Warning boundaries in seconds, descending: 1h, 30m, 10m, 5m, 1m.
pub const WARNING_THRESHOLDS: [i64; 5] = [3600, 1800, 600, 300, 60];

pub fn format_time_remaining(expires_at: &DateTime<Utc>) -> String {
    let now = Utc::now();
    if *expires_at <= now {
        return "EXPIRED".to_string();
    }

    let duration = (*expires_at - now).num_seconds();
    format_seconds(duration)
}

pub fn format_seconds(duration: i64) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Tracks which warning boundaries the countdown has crossed.
///
/// Each threshold fires at most once per countdown. A coarse tick that jumps
/// over a boundary (sleep/wake, delayed timer) still fires it retroactively
/// on the next observation; thresholds at or below the initial remaining
/// value never fire.
#[derive(Debug)]
pub struct ThresholdTracker {
    fired: [bool; WARNING_THRESHOLDS.len()],
    last_remaining: i64,
}

impl ThresholdTracker {
    pub fn new(initial_remaining: i64) -> Self {
        Self {
            fired: [false; WARNING_THRESHOLDS.len()],
            last_remaining: initial_remaining,
        }
    }

    /// Record a new remaining-time observation, returning the thresholds
    /// crossed since the previous one in descending order.
    pub fn advance(&mut self, remaining: i64) -> Vec<i64> {
        let mut crossed = Vec::new();
        for (i, &threshold) in WARNING_THRESHOLDS.iter().enumerate() {
            if !self.fired[i]
                && self.last_remaining > threshold
                && remaining <= threshold
                && remaining > 0
            {
                self.fired[i] = true;
                crossed.push(threshold);
            }
        }
        self.last_remaining = remaining;
        crossed
    }

    /// Re-arm every threshold for a fresh countdown (external renewal).
    pub fn reset(&mut self, remaining: i64) {
        *self = Self::new(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_time_remaining() {
        let expires = Utc::now() + Duration::minutes(90) + Duration::seconds(30);
        assert!(format_time_remaining(&expires).starts_with("1h 30m"));

        let expired = Utc::now() - Duration::seconds(1);
        assert_eq!(format_time_remaining(&expired), "EXPIRED");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(3661), "1h 1m");
        assert_eq!(format_seconds(125), "2m 5s");
        assert_eq!(format_seconds(42), "42s");
    }

    #[test]
    fn test_each_threshold_fires_once_in_order() {
        let mut tracker = ThresholdTracker::new(3601);
        let mut fired = Vec::new();
        let mut remaining = 3600;
        while remaining > 0 {
            fired.extend(tracker.advance(remaining));
            remaining -= 1;
        }
        assert_eq!(fired, vec![3600, 1800, 600, 300, 60]);
    }

    #[test]
    fn test_coarse_jump_fires_crossed_threshold() {
        let mut tracker = ThresholdTracker::new(3601);
        // A single tick jumping from 3601 to 3550 traversed the 3600 window.
        assert_eq!(tracker.advance(3550), vec![3600]);
        // The same boundary does not fire again.
        assert_eq!(tracker.advance(3500), Vec::<i64>::new());
    }

    #[test]
    fn test_jump_across_multiple_thresholds() {
        let mut tracker = ThresholdTracker::new(2000);
        assert_eq!(tracker.advance(200), vec![1800, 600, 300]);
        assert_eq!(tracker.advance(30), vec![60]);
    }

    #[test]
    fn test_thresholds_at_or_below_start_never_fire() {
        // Monitoring began with 1700s left: the 1h and 30m boundaries were
        // already behind us and stay silent.
        let mut tracker = ThresholdTracker::new(1700);
        let mut fired = Vec::new();
        let mut remaining = 1699;
        while remaining > 0 {
            fired.extend(tracker.advance(remaining));
            remaining -= 1;
        }
        assert_eq!(fired, vec![600, 300, 60]);
    }

    #[test]
    fn test_no_fire_at_zero_or_below() {
        let mut tracker = ThresholdTracker::new(70);
        assert_eq!(tracker.advance(0), Vec::<i64>::new());
    }

    #[test]
    fn test_reset_rearms_thresholds() {
        let mut tracker = ThresholdTracker::new(120);
        assert_eq!(tracker.advance(60), vec![60]);
        tracker.reset(7200);
        assert_eq!(tracker.advance(3600), vec![3600]);
    }
}
