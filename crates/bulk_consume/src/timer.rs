//! A one-shot deadline the Range Finder can poll without blocking.
//!
//! The dispatcher arms the timer before calling into the Range Finder and
//! drops it once a range is resolved. The Finder checks `is_expired` at
//! every loop iteration and applies the early-exit rules in `spec.md`
//! §4.2.2 / §4.2.3 rather than aborting the request — a timer expiry
//! produces a smaller-than-ideal chunk, never an error.

use std::time::{
    Duration,
    Instant,
};

#[derive(Clone, Copy, Debug)]
pub struct TimeBudgetTimer {
    deadline: Instant,
}

impl TimeBudgetTimer {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TimeBudgetTimer;

    #[test]
    fn expires_after_budget() {
        let timer = TimeBudgetTimer::starting_now(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.is_expired());
    }

    #[test]
    fn does_not_expire_early() {
        let timer = TimeBudgetTimer::starting_now(Duration::from_secs(60));
        assert!(!timer.is_expired());
    }
}
