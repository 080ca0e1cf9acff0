//! Real-time pacing between consecutive tags.

use std::time::Duration;

/// Wait before sending a tag stamped `current` when the previous tag sent
/// was stamped `previous`. Never negative.
pub fn delay_for(current: u32, previous: u32) -> Duration {
    Duration::from_millis(current.saturating_sub(previous) as u64)
}

/// Tracks the timestamp of the last transmitted tag and turns the next
/// timestamp into a wait.
#[derive(Debug, Clone)]
pub struct PacingClock {
    speed: f64,
    previous: Option<u32>,
}

impl PacingClock {
    /// A clock scaled by `speed`. 1.0 is real time; 0 (or anything not
    /// positive) sends as fast as possible. Delays too long to represent
    /// saturate at [`Duration::MAX`].
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            previous: None,
        }
    }

    pub fn real_time() -> Self {
        Self::new(1.0)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Timestamp of the last recorded transmission.
    pub fn baseline(&self) -> Option<u32> {
        self.previous
    }

    /// Delay before sending a tag stamped `current`. Zero until a baseline
    /// has been recorded.
    pub fn next_delay(&self, current: u32) -> Duration {
        let Some(previous) = self.previous else {
            return Duration::ZERO;
        };

        let delay = delay_for(current, previous);
        if self.speed == 1.0 {
            delay
        } else if self.speed > 0.0 {
            Duration::try_from_secs_f64(delay.as_secs_f64() / self.speed)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Make `timestamp` the new baseline. Call only after a successful send.
    pub fn record(&mut self, timestamp: u32) {
        self.previous = Some(timestamp);
    }
}

impl Default for PacingClock {
    fn default() -> Self {
        Self::real_time()
    }
}

/// Blocks the pump thread between tags.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_for_clamps_at_zero() {
        assert_eq!(delay_for(200, 50), Duration::from_millis(150));
        assert_eq!(delay_for(100, 100), Duration::ZERO);
        assert_eq!(delay_for(50, 100), Duration::ZERO);
        assert_eq!(delay_for(u32::MAX, 0), Duration::from_millis(u32::MAX as u64));
    }

    #[test]
    fn test_first_tag_has_no_delay() {
        let clock = PacingClock::real_time();
        assert_eq!(clock.baseline(), None);
        assert_eq!(clock.next_delay(5_000), Duration::ZERO);
    }

    #[test]
    fn test_non_monotonic_sequence() {
        let mut clock = PacingClock::real_time();
        let delays: Vec<u64> = [100u32, 100, 50, 200]
            .into_iter()
            .map(|ts| {
                let delay = clock.next_delay(ts);
                clock.record(ts);
                delay.as_millis() as u64
            })
            .collect();
        assert_eq!(delays, vec![0, 0, 0, 150]);
    }

    #[test]
    fn test_baseline_only_moves_on_record() {
        let mut clock = PacingClock::real_time();
        clock.record(100);
        assert_eq!(clock.next_delay(300), Duration::from_millis(200));
        assert_eq!(clock.next_delay(400), Duration::from_millis(300));
        assert_eq!(clock.baseline(), Some(100));
    }

    #[test]
    fn test_speed_multiplier() {
        let mut fast = PacingClock::new(2.0);
        fast.record(0);
        assert_eq!(fast.next_delay(1_000), Duration::from_millis(500));

        let mut slow = PacingClock::new(0.5);
        slow.record(0);
        assert_eq!(slow.next_delay(1_000), Duration::from_millis(2_000));

        let mut unpaced = PacingClock::new(0.0);
        unpaced.record(0);
        assert_eq!(unpaced.next_delay(1_000), Duration::ZERO);
    }

    #[test]
    fn test_tiny_speed_saturates() {
        let mut clock = PacingClock::new(1e-300);
        clock.record(0);
        assert_eq!(clock.next_delay(40), Duration::MAX);
        assert_eq!(clock.next_delay(0), Duration::ZERO);
    }
}
