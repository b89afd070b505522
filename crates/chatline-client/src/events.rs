use std::fmt;

use chatline_core::{ChannelId, ChatMessage, Notice};
use thiserror::Error;

/// Lifecycle state of the channel connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    #[default]
    Idle,
    Connecting,
    Authenticating,
    Open,
    Closing,
    Reconnecting,
    /// Terminal until the channel is selected again.
    Failed,
}

impl LinkState {
    pub fn is_connected(self) -> bool {
        self == Self::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the controller entered `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("missing credential")]
    MissingCredential,
    #[error("unauthorized (close code {code})")]
    Unauthorized { code: u16 },
    #[error("connection lost after {attempts} attempts; select the channel again to retry")]
    RetriesExhausted { attempts: u32 },
}

/// Typed notification emitted by the client for every observable change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new channel became active. Ledger and visible list start empty.
    Bound { channel: ChannelId },
    /// No channel is active anymore.
    Unbound { reason: Option<String> },
    StateChanged(LinkState),
    /// A new, not previously seen message for the visible list.
    Message(ChatMessage),
    /// Recent messages to place ahead of live ones, already deduplicated.
    HistorySeeded(Vec<ChatMessage>),
    Notice(Notice),
    Failed { reason: FailureReason },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_render_stable_text() {
        assert_eq!(FailureReason::MissingCredential.to_string(), "missing credential");
        assert_eq!(
            FailureReason::Unauthorized { code: 1008 }.to_string(),
            "unauthorized (close code 1008)"
        );
        assert!(FailureReason::RetriesExhausted { attempts: 5 }
            .to_string()
            .contains("select the channel again"));
    }

    #[test]
    fn only_open_counts_as_connected() {
        assert!(LinkState::Open.is_connected());
        assert!(!LinkState::Authenticating.is_connected());
        assert!(!LinkState::Reconnecting.is_connected());
    }
}
