use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default `HOST.TIMESCALE`: one scaled minute per wall-clock minute.
pub const DEFAULT_TIMESCALE: i64 = 60;

/// The service's internal time unit is "scaled minutes": `unix_time / timescale`.
/// Shrinking `timescale` in tests makes schedules tick in seconds instead of minutes.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time source, divided by a configurable scale factor.
pub struct ScaledClock {
    timescale: i64,
}

impl ScaledClock {
    pub fn new(timescale: i64) -> Self {
        assert!(timescale > 0, "timescale must be positive");
        Self { timescale }
    }
}

impl Default for ScaledClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESCALE)
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> i64 {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64;
        unix / self.timescale
    }
}

/// A clock whose value is set explicitly, for deterministic scheduler tests.
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(100);
        assert_eq!(clock.now(), 100);
        clock.advance(50);
        assert_eq!(clock.now(), 150);
    }

    #[test]
    fn scaled_clock_is_monotone_nondecreasing() {
        let clock = ScaledClock::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
