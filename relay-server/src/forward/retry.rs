use std::time::Duration;

/// Fixed-interval retry policy for forwarding.
///
/// Unlike an exponential backoff, every retry waits the same interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    /// `max_attempts` counts the first attempt, and is raised to at least one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt after `attempts_made` failures, or
    /// `None` once the budget is spent.
    pub fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        if attempts_made >= self.max_attempts {
            None
        } else {
            Some(self.interval)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(60)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(60)));
        assert_eq!(policy.next_delay(3), None);
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.next_delay(1), None);
    }

    #[test]
    fn test_total_wait_is_bounded() {
        let policy = RetryPolicy::default();
        let total: Duration = (1..)
            .map_while(|attempt| policy.next_delay(attempt))
            .sum();
        assert_eq!(total, Duration::from_secs(120));
    }
}
