//! Engine configuration: push pacing, deadlines and re-drain backoff.

use std::time::Duration;

/// Knobs for the push path, the pull path and the lifecycle loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Per-item attempts and re-drain backoff.
    pub retry: RetryConfig,
    /// Delay between drained items.
    pub drain_throttle: Duration,
    /// Deadline for every remote call; `None` relies on the transport.
    pub remote_timeout: Option<Duration>,
    /// Completed queue items older than this are pruned after each drain.
    pub completed_retention: Option<Duration>,
    /// Whether mutations trigger a drain before returning.
    pub drain_on_mutation: bool,
    /// Whether a drain that leaves retryable items schedules another one.
    pub auto_retry: bool,
}

impl SyncConfig {
    /// Creates a new sync configuration with defaults.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            drain_throttle: Duration::ZERO,
            remote_timeout: Some(Duration::from_secs(30)),
            completed_retention: Some(Duration::from_secs(24 * 60 * 60)),
            drain_on_mutation: true,
            auto_retry: true,
        }
    }

    /// Replaces the attempt and backoff settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the delay between drained items.
    pub fn with_drain_throttle(mut self, throttle: Duration) -> Self {
        self.drain_throttle = throttle;
        self
    }

    /// Sets the per-call remote deadline.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    /// Disables the engine-level remote deadline.
    pub fn without_remote_timeout(mut self) -> Self {
        self.remote_timeout = None;
        self
    }

    /// Sets how long completed queue items are kept.
    pub fn with_completed_retention(mut self, retention: Option<Duration>) -> Self {
        self.completed_retention = retention;
        self
    }

    /// Sets whether mutations trigger a drain.
    pub fn with_drain_on_mutation(mut self, enabled: bool) -> Self {
        self.drain_on_mutation = enabled;
        self
    }

    /// Sets whether retryable leftovers schedule a delayed drain.
    pub fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// How often a queue item may be pushed, and how long the coordinator
/// waits before re-draining after retryable failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Pushes allowed per item, the first one included.
    pub max_attempts: u32,
    /// Wait before the first automatic re-drain.
    pub initial_delay: Duration,
    /// Upper bound for any re-drain wait (before jitter).
    pub max_delay: Duration,
    /// Factor applied to the wait after each consecutive re-drain.
    pub backoff_multiplier: u32,
    /// Adds up to a quarter of the wait on top.
    pub jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` pushes per item with 0.5 s doubling waits
    /// capped at 30 s.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2,
            jitter: true,
        }
    }

    /// Sets the first re-drain wait.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps the re-drain wait.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive waits.
    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier.max(1);
        self
    }

    /// Turns jitter on or off.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Whether an item already retried `retry_count` times goes back to
    /// pending after one more retryable failure.
    pub fn should_retry(&self, retry_count: u32) -> bool {
        retry_count.saturating_add(1) < self.max_attempts
    }

    /// Wait before the `attempt`-th consecutive re-drain (1-based; 0 means
    /// no wait).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(steps) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };

        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let factor = u64::from(self.backoff_multiplier).saturating_pow(steps);
        let wait_ms = initial_ms.saturating_mul(factor).min(max_ms);

        let extra_ms = if self.jitter {
            wait_ms / 4 * jitter_permille() / 1000
        } else {
            0
        };
        Duration::from_millis(wait_ms.saturating_add(extra_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// 0..1000 taken from the sub-second part of the wall clock.
fn jitter_permille() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_drain_throttle(Duration::from_millis(5))
            .with_remote_timeout(Duration::from_secs(2))
            .with_completed_retention(None)
            .with_drain_on_mutation(false)
            .with_auto_retry(false);

        assert_eq!(config.drain_throttle, Duration::from_millis(5));
        assert_eq!(config.remote_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.completed_retention, None);
        assert!(!config.drain_on_mutation);
        assert!(!config.auto_retry);
        assert_eq!(config.without_remote_timeout().remote_timeout, None);
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.remote_timeout, Some(Duration::from_secs(30)));
        assert!(config.drain_on_mutation);
    }

    #[test]
    fn three_attempts_allow_two_retries() {
        let retry = RetryConfig::default();
        assert!(retry.should_retry(0));
        assert!(retry.should_retry(1));
        assert!(!retry.should_retry(2));
        assert!(!RetryConfig::new(1).should_retry(0));
    }

    #[test]
    fn waits_double_until_capped() {
        let retry = RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_millis(700))
            .with_jitter(false);

        let waits: Vec<u128> = (0..5)
            .map(|attempt| retry.delay_for_attempt(attempt).as_millis())
            .collect();
        assert_eq!(waits, [0, 200, 400, 700, 700]);
    }

    #[test]
    fn jitter_adds_at_most_a_quarter() {
        let retry = RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(400))
            .with_backoff_multiplier(3);
        for _ in 0..20 {
            let wait = retry.delay_for_attempt(2);
            assert!(wait >= Duration::from_millis(1200));
            assert!(wait <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let retry = RetryConfig::default().with_jitter(false);
        assert_eq!(retry.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }
}
