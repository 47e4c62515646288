//! Reconnection policy with exponential backoff

use std::time::Duration;

/// Configuration for automatic reconnection with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Reconnect after an unexpected close
    pub enabled: bool,
    /// Base delay; attempt `n` waits `initial_delay * 2^n` before jitter
    pub initial_delay: Duration,
    /// Upper bound for the pre-jitter delay
    pub max_delay: Duration,
    /// Maximum consecutive attempts (0 = unlimited)
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Never reconnect automatically
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set maximum attempts (0 = unlimited)
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Pre-jitter delay for attempt number `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(64) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    /// Scale `base` by a uniform random factor in `[0.5, 1.5)`
    pub fn apply_jitter(&self, base: Duration) -> Duration {
        base.mul_f64(0.5 + rand::random::<f64>())
    }

    /// Jittered delay for attempt number `attempt`
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        self.apply_jitter(self.delay_for_attempt(attempt))
    }

    /// True if another attempt may be scheduled after `attempts` made so far
    pub fn should_reconnect(&self, attempts: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempts < self.max_attempts)
    }
}
