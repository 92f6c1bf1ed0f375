//! Configuration for the background sync scheduler.

use std::time::Duration;

/// Trigger policy and timing knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Master feature flag. When off, only manual syncs are admitted.
    pub enabled: bool,
    /// Whether the periodic timer runs.
    pub auto_sync: bool,
    /// Minimum gap between foreground-triggered rounds.
    pub foreground_min_interval: Duration,
    /// Periodic timer interval.
    pub periodic_interval: Duration,
    /// Quiet window for the local-change trigger.
    pub debounce_window: Duration,
    /// Automatic retry behavior for failed rounds.
    pub retry: RetryConfig,
}

impl SchedulerConfig {
    /// Creates a configuration with production defaults.
    pub fn new() -> Self {
        Self {
            enabled: true,
            auto_sync: true,
            foreground_min_interval: Duration::from_secs(5 * 60),
            periodic_interval: Duration::from_secs(30 * 60),
            debounce_window: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Enables or disables background sync entirely.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enables or disables the periodic timer.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Sets the minimum gap between foreground-triggered rounds.
    pub fn with_foreground_min_interval(mut self, interval: Duration) -> Self {
        self.foreground_min_interval = interval;
        self
    }

    /// Sets the periodic timer interval.
    pub fn with_periodic_interval(mut self, interval: Duration) -> Self {
        self.periodic_interval = interval;
        self
    }

    /// Sets the local-change quiet window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for automatic retries of a failed round.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt ceiling.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no automatic retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay preceding the given attempt (1-indexed retries;
    /// attempt 0 is the initial try and has no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
