//! Periodic driver for the engine's internal timer.
//!
//! The engine's `periodic` call takes the number of milliseconds elapsed
//! since the last call. Instead of a wall-clock timer, each event-loop
//! iteration asks the driver: it reads the monotonic clock and reports one
//! elapsed millisecond when at least that much has passed, else zero. The
//! approximation is fine because engine timeouts are in the hundreds of
//! milliseconds.

use std::time::{Duration, Instant};

pub struct PeriodicDriver {
    interval: Duration,
    last_tick: Instant,
}

impl PeriodicDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: Instant::now(),
        }
    }

    /// 1 if a full interval has elapsed since the reference point (which
    /// then resets), else 0.
    pub fn elapsed_ms(&mut self) -> u64 {
        if self.last_tick.elapsed() >= self.interval {
            self.last_tick = Instant::now();
            1
        } else {
            0
        }
    }
}

impl Default for PeriodicDriver {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tick_before_interval() {
        let mut driver = PeriodicDriver::new(Duration::from_secs(3600));
        assert_eq!(driver.elapsed_ms(), 0);
        assert_eq!(driver.elapsed_ms(), 0);
    }

    #[test]
    fn tick_after_interval_then_reset() {
        let mut driver = PeriodicDriver::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(driver.elapsed_ms(), 1);
        // Reference point was reset; the next call is sub-interval again.
        assert_eq!(driver.elapsed_ms(), 0);
    }
}
