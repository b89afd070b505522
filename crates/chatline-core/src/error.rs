use thiserror::Error;

/// Shared lightweight error type for core primitive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Channel identifier rejected at bind time.
    #[error("invalid channel: {0}")]
    InvalidChannel(&'static str),
    /// Inbound frame that is not a JSON envelope object.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// Outbound payload that cannot be encoded as a frame.
    #[error("encode error: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::ChatError;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            ChatError::InvalidChannel("empty").to_string(),
            "invalid channel: empty"
        );
        assert_eq!(
            ChatError::MalformedEnvelope("expected object".into()).to_string(),
            "malformed envelope: expected object"
        );
        assert_eq!(
            ChatError::Encode("not an object".into()).to_string(),
            "encode error: not an object"
        );
    }
}
