//! Quota breaker for the upstream data source.
//!
//! Bulk history endpoints enforce an hourly request quota. When the upstream
//! answers with a quota/ban status, or several consecutive requests fail, the
//! breaker opens and refuses every request until the cooldown passes. The
//! scheduler marks all remaining plan units as blocked the moment this
//! happens instead of issuing requests that will be refused anyway.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BreakerInner {
    opened_at: Option<Instant>,
    consecutive_failures: u32,
}

/// Refuses requests for a cooldown after the upstream pushes back.
#[derive(Debug)]
pub struct QuotaBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl QuotaBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                opened_at: None,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold,
        }
    }

    /// Default tuning: one-hour cooldown (the upstream quota window), open
    /// after 5 consecutive failures.
    pub fn default_upstream() -> Self {
        Self::new(Duration::from_secs(60 * 60), 5)
    }

    /// Whether requests are currently allowed. Resets the breaker once the
    /// cooldown has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => true,
            Some(at) => {
                if at.elapsed() >= self.cooldown {
                    inner.opened_at = None;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// A request succeeded: clear the failure streak.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// A request failed. Opens the breaker when the streak reaches the
    /// threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Open immediately (quota exhausted / banned response).
    pub fn open(&self) {
        self.inner.lock().unwrap().opened_at = Some(Instant::now());
    }

    /// Remaining cooldown, zero when closed.
    pub fn remaining_cooldown(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => Duration::ZERO,
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let b = QuotaBreaker::new(Duration::from_secs(60), 3);
        assert!(b.is_allowed());
        assert_eq!(b.remaining_cooldown(), Duration::ZERO);
    }

    #[test]
    fn opens_at_failure_threshold() {
        let b = QuotaBreaker::new(Duration::from_secs(60), 3);
        b.record_failure();
        b.record_failure();
        assert!(b.is_allowed());
        b.record_failure();
        assert!(!b.is_allowed());
    }

    #[test]
    fn success_clears_streak() {
        let b = QuotaBreaker::new(Duration::from_secs(60), 2);
        b.record_failure();
        b.record_success();
        b.record_failure();
        assert!(b.is_allowed());
    }

    #[test]
    fn immediate_open() {
        let b = QuotaBreaker::new(Duration::from_secs(60), 3);
        b.open();
        assert!(!b.is_allowed());
        assert!(b.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn closes_after_cooldown() {
        let b = QuotaBreaker::new(Duration::from_millis(10), 3);
        b.open();
        assert!(!b.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(b.is_allowed());
    }
}
