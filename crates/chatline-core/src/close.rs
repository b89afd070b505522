/// Clean shutdown; never retried.
pub const CLOSE_NORMAL: u16 = 1000;
/// Reserved code reported when no close frame was received.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Reserved code for abrupt loss or failed establishment.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Standard policy-violation code, treated as an authorization rejection.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Application-specific authorization rejection.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// What the lifecycle controller should do after a transport closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Closed on purpose; stay down.
    Clean,
    /// Credential rejected; terminal.
    Unauthorized,
    /// Anything else; eligible for reconnect.
    Abnormal,
}

pub fn classify_close(code: u16) -> CloseDisposition {
    match code {
        CLOSE_NORMAL => CloseDisposition::Clean,
        CLOSE_UNAUTHORIZED | CLOSE_POLICY_VIOLATION => CloseDisposition::Unauthorized,
        _ => CloseDisposition::Abnormal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_unauthorized_codes_are_terminal() {
        assert_eq!(
            classify_close(CLOSE_UNAUTHORIZED),
            CloseDisposition::Unauthorized
        );
        assert_eq!(
            classify_close(CLOSE_POLICY_VIOLATION),
            CloseDisposition::Unauthorized
        );
    }

    #[test]
    fn everything_else_but_normal_is_abnormal() {
        assert_eq!(classify_close(CLOSE_NORMAL), CloseDisposition::Clean);
        for code in [1001, CLOSE_NO_STATUS, CLOSE_ABNORMAL, 1011, 4000, 4002] {
            assert_eq!(classify_close(code), CloseDisposition::Abnormal, "{code}");
        }
    }
}
