//! Fixed-delay reconnect policy.
//!
//! After a failed connect or an unexpected close the session asks the policy
//! for the delay before the next attempt. Every attempt waits the same
//! configured delay; the only thing that changes is the attempt counter,
//! which resets on a successful connect.
//!
//! ```ignore
//! let mut policy = ReconnectPolicy::new(Some(3), Duration::from_millis(500));
//! while let Ok(delay) = policy.next_delay() {
//!     tokio::time::sleep(delay).await;
//!     // attempt connection
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Error returned once the attempt limit has been reached.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    /// All allowed attempts were used. Carries the configured limit.
    #[error("all {0} reconnect attempts failed")]
    Exhausted(u32),
}

/// Reconnect policy: attempt limit, fixed delay and the attempt counter.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// `None` means retry forever.
    max_attempts: Option<u32>,
    delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: Option<u32>, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempts: 0,
        }
    }

    /// Build from the sentinel form: any negative limit disables it.
    pub fn from_limit(max_attempts: i64, delay: Duration) -> Self {
        let max = if max_attempts < 0 {
            None
        } else {
            Some(u32::try_from(max_attempts).unwrap_or(u32::MAX))
        };
        Self::new(max, delay)
    }

    /// Count one more attempt and return the delay to wait before it.
    ///
    /// Fails without touching the counter when the limit is reached.
    pub fn next_delay(&mut self) -> Result<Duration, RetryError> {
        if let Some(max) = self.max_attempts {
            if self.attempts >= max {
                return Err(RetryError::Exhausted(max));
            }
        }
        self.attempts += 1;
        Ok(self.delay)
    }

    /// Forget previous attempts; called after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for ReconnectPolicy {
    /// Unlimited attempts, one second apart.
    fn default() -> Self {
        Self::new(None, Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_fixed() {
        let mut policy = ReconnectPolicy::new(None, Duration::from_millis(250));
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Ok(Duration::from_millis(250)));
        }
        assert_eq!(policy.attempts(), 10);
    }

    #[test]
    fn limit_is_enforced() {
        let mut policy = ReconnectPolicy::new(Some(2), Duration::from_millis(10));
        assert!(policy.next_delay().is_ok());
        assert!(policy.next_delay().is_ok());
        assert_eq!(policy.next_delay(), Err(RetryError::Exhausted(2)));
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn zero_limit_never_retries() {
        let mut policy = ReconnectPolicy::new(Some(0), Duration::from_millis(10));
        assert_eq!(policy.next_delay(), Err(RetryError::Exhausted(0)));
    }

    #[test]
    fn reset_restores_budget() {
        let mut policy = ReconnectPolicy::new(Some(1), Duration::from_millis(10));
        policy.next_delay().unwrap();
        assert!(policy.next_delay().is_err());
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert!(policy.next_delay().is_ok());
    }

    #[test]
    fn negative_limit_is_unlimited() {
        let policy = ReconnectPolicy::from_limit(-1, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), None);
        let policy = ReconnectPolicy::from_limit(5, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), Some(5));
    }

    #[test]
    fn default_is_unlimited_one_second() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts(), None);
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }
}
