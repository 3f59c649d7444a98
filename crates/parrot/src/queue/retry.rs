use std::time::Duration;

/// Bounded attempts plus a fixed escalating delay schedule, shared by
/// both lanes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay after the n-th failed attempt is `backoff[n - 1]`, clamped to
    /// the last entry.
    pub backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_secs(max_attempts: u32, backoff_secs: &[u64]) -> Self {
        Self::new(
            max_attempts,
            backoff_secs.iter().copied().map(Duration::from_secs).collect(),
        )
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.backoff
            .get(idx)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether another attempt may follow failed attempt `attempt`.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(3, &[60, 300, 1800])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(60));
        assert_eq!(policy.delay_after(2), Duration::from_secs(300));
        assert_eq!(policy.delay_after(3), Duration::from_secs(1800));
    }

    #[test]
    fn test_delay_clamps_to_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(7), Duration::from_secs(1800));
    }

    #[test]
    fn test_empty_schedule_retries_immediately() {
        let policy = RetryPolicy::new(2, vec![]);
        assert_eq!(policy.delay_after(1), Duration::ZERO);
    }

    #[test]
    fn test_attempt_bound() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry_after(1));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::new(0, vec![]).max_attempts, 1);
    }
}
