//! Retry spacing with exponential backoff and bounded jitter.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff policy.
///
/// The floor for attempt `n` (0-indexed) is
/// `min(initial_delay * multiplier^n, max_delay) + n` milliseconds, which is
/// strictly increasing in `n` even once the cap is reached. Jitter of up to
/// `jitter_ratio * floor` is added, clipped so it never reaches the next
/// attempt's floor. At the cap there is no room left, so capped delays are
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Fraction of the floor added as random jitter.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy without jitter, for deterministic schedules.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_ratio = 0.0;
        self
    }

    /// Check the invariants that keep backoff monotonic.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.as_millis() == 0 {
            return Err("initial_delay must be at least 1ms".into());
        }
        if self.max_delay < self.initial_delay {
            return Err("max_delay must be at least initial_delay".into());
        }
        if !(self.multiplier > 1.0) {
            return Err("multiplier must be greater than 1".into());
        }
        if !(0.0..self.multiplier - 1.0).contains(&self.jitter_ratio) {
            return Err("jitter_ratio must be in [0, multiplier - 1)".into());
        }
        Ok(())
    }

    /// Whether the exponential part has reached `max_delay` for this attempt.
    #[must_use]
    pub fn is_capped(&self, attempt: u32) -> bool {
        self.exponential_ms(attempt) >= self.max_delay.as_millis()
    }

    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn exponential_ms(&self, attempt: u32) -> u128 {
        let max_ms = self.max_delay.as_millis();
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        if !ms.is_finite() || ms >= max_ms as f64 {
            return max_ms;
        }
        (ms as u128).min(max_ms)
    }

    fn floor_ms(&self, attempt: u32) -> u128 {
        self.exponential_ms(attempt) + u128::from(attempt)
    }

    /// Smallest delay (no jitter) the given 0-indexed attempt can produce.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        duration_from_ms(self.floor_ms(attempt))
    }

    /// Delay including jitter for the given attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        duration_from_ms(self.delay_ms(attempt))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn delay_ms(&self, attempt: u32) -> u128 {
        let floor = self.floor_ms(attempt);
        if self.jitter_ratio <= 0.0 || attempt == u32::MAX {
            return floor;
        }
        let headroom = self.floor_ms(attempt + 1) - floor - 1;
        if headroom == 0 {
            return floor;
        }
        let factor: f64 = rand::rng().random_range(0.0..self.jitter_ratio);
        let jitter = (floor as f64 * factor) as u128;
        floor + jitter.min(headroom)
    }

    /// Absolute due time of the next attempt after `attempt` failed at `now_ms`.
    #[must_use]
    pub fn next_due_at_ms(&self, now_ms: u128, attempt: u32) -> u128 {
        now_ms + self.delay_ms(attempt)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_from_ms(ms: u128) -> Duration {
    Duration::from_millis(ms.min(u128::from(u64::MAX)) as u64)
}
