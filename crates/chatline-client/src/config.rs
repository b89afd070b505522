use std::time::Duration;

use chatline_core::backoff::{DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CEILING, DEFAULT_MAX_ATTEMPTS};
use chatline_core::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Socket endpoint base; channel connections go to `{socket_base}/{channel}`.
    pub socket_base: String,
    /// Maximum number of messages requested when seeding history.
    pub history_limit: usize,
    /// Delay before the first reconnect.
    pub backoff_base: Duration,
    /// Upper bound for any reconnect delay.
    pub backoff_ceiling: Duration,
    /// Consecutive abnormal closures tolerated before giving up.
    pub max_attempts: u32,
    /// Capacity of the command queue between handles and the client task.
    pub command_capacity: usize,
    /// Capacity of the session event broadcast.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_base: "ws://127.0.0.1:8080/ws".to_string(),
            history_limit: 50,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_ceiling: DEFAULT_BACKOFF_CEILING,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            command_capacity: 64,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn new(socket_base: impl Into<String>) -> Self {
        Self {
            socket_base: socket_base.into(),
            ..Self::default()
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_base, self.backoff_ceiling, self.max_attempts)
    }
}
