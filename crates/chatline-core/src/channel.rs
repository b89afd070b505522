use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Maximum accepted channel identifier length in bytes.
pub const MAX_CHANNEL_ID_LEN: usize = 128;

/// Validated identifier of the channel a subscription is bound to.
///
/// Identifiers are trimmed and must be non-empty, at most
/// [`MAX_CHANNEL_ID_LEN`] bytes, and restricted to ASCII alphanumerics plus
/// `-`, `_`, `.` and `:` so they can be placed in an endpoint path unescaped.
/// Ids made only of dots are rejected since they are path navigation segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(String);

impl ChannelId {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChatError::InvalidChannel("channel id is empty"));
        }
        // Stringified "no selection" placeholders.
        if trimmed == "null" || trimmed == "undefined" {
            return Err(ChatError::InvalidChannel("no channel selected"));
        }
        if trimmed.len() > MAX_CHANNEL_ID_LEN {
            return Err(ChatError::InvalidChannel("channel id is too long"));
        }
        if trimmed.bytes().all(|byte| byte == b'.') {
            return Err(ChatError::InvalidChannel("channel id is a dot segment"));
        }
        if !trimmed.bytes().all(is_channel_byte) {
            return Err(ChatError::InvalidChannel(
                "channel id contains unsupported characters",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_channel_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b':')
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChannelId {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelId> for String {
    fn from(value: ChannelId) -> Self {
        value.0
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
