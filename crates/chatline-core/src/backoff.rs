use std::time::Duration;

/// Default delay before the first reconnect.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Default upper bound for any reconnect delay.
pub const DEFAULT_BACKOFF_CEILING: Duration = Duration::from_secs(30);
/// Default number of consecutive abnormal closures tolerated before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    ceiling: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            ceiling,
            max_attempts,
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `min(base * 2^attempt, ceiling)`, with the exponent clamped so the
    /// multiplication cannot overflow.
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(31);
        let factor = 1_u32 << shift;
        self.base.saturating_mul(factor).min(self.ceiling)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_BASE,
            DEFAULT_BACKOFF_CEILING,
            DEFAULT_MAX_ATTEMPTS,
        )
    }
}

/// Consecutive-failure counter driving reconnect scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    policy: BackoffPolicy,
    attempt: u32,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Number of abnormal closures since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Counts one abnormal closure and returns the delay before the next
    /// connection, or `None` once the attempt ceiling has been reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let current = self.attempt;
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        Some(self.policy.delay(current))
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}
