//! Configuration for the device-side engine.

use regatta_types::DeviceId;
use std::time::Duration;

/// The fixed backoff ladder applied to transient failures.
///
/// The ladder and the maximum attempt count are deliberately
/// configuration inputs, not constants: field conditions (venue radio
/// links, cellular coverage) vary too much for one built-in value.
/// Exceeding `max_attempts` parks the entry as `Failed` for operator
/// attention; it is never dropped.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    /// Delay before each retry, indexed by attempt; the last step
    /// repeats once the ladder is exhausted.
    pub steps: Vec<Duration>,
    /// Attempts after which an entry becomes `Failed`.
    pub max_attempts: u32,
}

impl RetrySchedule {
    /// Creates a schedule from explicit steps.
    pub fn new(steps: Vec<Duration>, max_attempts: u32) -> Self {
        Self {
            steps,
            max_attempts,
        }
    }

    /// The production ladder: 1 m, 5 m, 15 m, 1 h, 6 h.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(
            vec![
                Duration::from_secs(60),
                Duration::from_secs(5 * 60),
                Duration::from_secs(15 * 60),
                Duration::from_secs(60 * 60),
                Duration::from_secs(6 * 60 * 60),
            ],
            6,
        )
    }

    /// A schedule with no delays, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(vec![Duration::ZERO], 3)
    }

    /// Sets the maximum attempt count.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the delay to wait after the given failed attempt
    /// (1-indexed). Attempts past the end of the ladder reuse the last
    /// step.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.steps.is_empty() {
            return Duration::ZERO;
        }
        let index = ((attempt - 1) as usize).min(self.steps.len() - 1);
        self.steps[index]
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::standard()
    }
}

/// Configuration for the device-side sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This replica's identity; every request is attributed to it.
    pub device_id: DeviceId,
    /// Hub URL.
    pub hub_url: String,
    /// Authentication token presented with every request.
    pub auth_token: Vec<u8>,
    /// Maximum records per upload request.
    pub upload_chunk_size: usize,
    /// Bounded timeout for every network call.
    pub timeout: Duration,
    /// Backoff ladder for transient failures.
    pub retry: RetrySchedule,
    /// Interval between scheduler ticks.
    pub drain_interval: Duration,
}

impl EngineConfig {
    /// Creates a configuration for a device.
    pub fn new(device_id: DeviceId, hub_url: impl Into<String>) -> Self {
        Self {
            device_id,
            hub_url: hub_url.into(),
            auth_token: Vec::new(),
            upload_chunk_size: 50,
            timeout: Duration::from_secs(30),
            retry: RetrySchedule::standard(),
            drain_interval: Duration::from_secs(30),
        }
    }

    /// Sets the authentication token.
    #[must_use]
    pub fn with_auth_token(mut self, token: Vec<u8>) -> Self {
        self.auth_token = token;
        self
    }

    /// Sets the upload chunk size.
    #[must_use]
    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.upload_chunk_size = size.max(1);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry schedule.
    #[must_use]
    pub fn with_retry(mut self, retry: RetrySchedule) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the scheduler tick interval.
    #[must_use]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ladder() {
        let schedule = RetrySchedule::standard();
        assert_eq!(schedule.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(schedule.delay_for_attempt(1), Duration::from_secs(60));
        assert_eq!(schedule.delay_for_attempt(2), Duration::from_secs(300));
        assert_eq!(schedule.delay_for_attempt(5), Duration::from_secs(21_600));
        // Past the ladder the last step repeats.
        assert_eq!(schedule.delay_for_attempt(99), Duration::from_secs(21_600));
    }

    #[test]
    fn empty_ladder_is_zero_delay() {
        let schedule = RetrySchedule::new(Vec::new(), 2);
        assert_eq!(schedule.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn config_builder() {
        let device = DeviceId::from_bytes([1u8; 16]);
        let config = EngineConfig::new(device, "https://hub.example.com")
            .with_upload_chunk_size(10)
            .with_timeout(Duration::from_secs(5))
            .with_auth_token(vec![1, 2, 3]);

        assert_eq!(config.device_id, device);
        assert_eq!(config.hub_url, "https://hub.example.com");
        assert_eq!(config.upload_chunk_size, 10);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.auth_token, vec![1, 2, 3]);
    }

    #[test]
    fn chunk_size_never_zero() {
        let config = EngineConfig::new(DeviceId::new(), "").with_upload_chunk_size(0);
        assert_eq!(config.upload_chunk_size, 1);
    }
}
