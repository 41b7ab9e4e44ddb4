//! Error taxonomy for the Sentinel gate.

use thiserror::Error;

/// Errors raised while issuing or verifying challenges
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Verification link is missing its token or answer
    #[error("Invalid verification link")]
    InvalidRequest,

    /// No challenge under this token (expired, consumed, or never issued)
    #[error("Challenge expired or invalid")]
    ChallengeNotFound,

    /// Token is valid but the answer is wrong; the challenge stays open
    #[error("Incorrect answer")]
    IncorrectAnswer,

    /// The stored message has no recoverable sender address
    #[error("Unable to determine the original sender")]
    UnparseableSender,

    /// Key-value store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Mail transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::ChallengeNotFound => 400,
            Self::IncorrectAnswer => 400,
            Self::UnparseableSender => 400,
            Self::Store(_) => 503,
            Self::Transport(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if the invoking runtime should re-deliver the trigger
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Transport(_))
    }

    /// Returns true if this error is caused by the visitor rather than the gate
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_requests() {
        for err in [
            SentinelError::InvalidRequest,
            SentinelError::ChallengeNotFound,
            SentinelError::IncorrectAnswer,
            SentinelError::UnparseableSender,
        ] {
            assert_eq!(err.status_code(), 400);
            assert!(err.is_client_error());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_backend_errors_are_retryable() {
        assert!(SentinelError::Store("down".into()).is_retryable());
        assert!(SentinelError::Transport("refused".into()).is_retryable());
        assert!(!SentinelError::Internal("bug".into()).is_retryable());
        assert_eq!(SentinelError::Store("down".into()).status_code(), 503);
    }

    #[test]
    fn test_messages_match_views() {
        assert_eq!(
            SentinelError::InvalidRequest.to_string(),
            "Invalid verification link"
        );
        assert_eq!(
            SentinelError::ChallengeNotFound.to_string(),
            "Challenge expired or invalid"
        );
    }
}
