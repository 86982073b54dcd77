use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-email failure limiter using a fixed window.
///
/// `check()` does not count anything; call `record_failure()` after a failed
/// attempt and `clear()` after a successful one.
pub struct AttemptLimiter {
    /// email -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Login brute-force guard: 5 failures per 15 minutes.
    pub fn for_login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// Reset-code guessing guard: 5 failed redemptions per 15 minutes.
    pub fn for_reset() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// Ok if another attempt is allowed, otherwise Err with retry-after seconds.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(&email.to_lowercase()) else {
            return Ok(());
        };

        let (count, start) = entry.value();
        let elapsed = now.duration_since(*start);

        if elapsed > self.window {
            return Ok(());
        }

        if *count >= self.max_failures {
            return Err(self.window.as_secs().saturating_sub(elapsed.as_secs()));
        }

        Ok(())
    }

    pub fn record_failure(&self, email: &str) {
        let now = Instant::now();

        let mut entry = self.entries.entry(email.to_lowercase()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    pub fn clear(&self, email: &str) {
        self.entries.remove(&email.to_lowercase());
    }

    /// Remove stale entries older than the given duration.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, (_, start)| now.duration_since(*start) < max_age);
    }
}
