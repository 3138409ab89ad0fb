//! The module contains the errors a redemption session can surface.
//!
//! Two families exist:
//!
//! - [`SessionError`] is terminal for the current token. Once raised the
//!   session sits in [`Stage::Errored`] and only a full restart with a new
//!   token recovers.
//! - [`FlowError`] wraps a [`SessionError`] or reports a misuse that leaves the
//!   session untouched (wrong stage, invalid form, review not confirmed).
//!
//! [`BackendError`] is what the external collaborators return; the session
//! classifies it into the terminal taxonomy.
//!
//!  [`Stage::Errored`]: crate::session::Stage::Errored
use api_types::FailureCode;
use thiserror::Error;

use crate::{identity::FormError, session::Stage};

/// User-facing error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    TokenInvalidOrUsed,
    DailyLimitExceeded,
    NoPrizesConfigured,
    NetworkOrServerError,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::TokenInvalidOrUsed => "TOKEN_INVALID_OR_USED",
            Self::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            Self::NoPrizesConfigured => "NO_PRIZES_CONFIGURED",
            Self::NetworkOrServerError => "NETWORK_OR_SERVER_ERROR",
        }
    }
}

/// Terminal session errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("This link is invalid or has already been used: {0}. Ask the branch for a new one.")]
    TokenInvalidOrUsed(String),
    #[error("The daily spin limit has been reached. Please come back tomorrow.")]
    DailyLimitExceeded,
    #[error("No prizes are configured for this branch right now.")]
    NoPrizesConfigured,
    #[error("Something went wrong: {0}")]
    NetworkOrServer(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenInvalidOrUsed(_) => ErrorKind::TokenInvalidOrUsed,
            Self::DailyLimitExceeded => ErrorKind::DailyLimitExceeded,
            Self::NoPrizesConfigured => ErrorKind::NoPrizesConfigured,
            Self::NetworkOrServer(_) => ErrorKind::NetworkOrServerError,
        }
    }
}

impl From<BackendError> for SessionError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Rejected { code, message } => match code {
                FailureCode::TokenInvalidOrUsed => Self::TokenInvalidOrUsed(message),
                FailureCode::DailyLimitExceeded => Self::DailyLimitExceeded,
                FailureCode::NoPrizesConfigured => Self::NoPrizesConfigured,
            },
            other => Self::NetworkOrServer(other.to_string()),
        }
    }
}

/// Errors returned by the reward backend and the address lookup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{message}")]
    Rejected { code: FailureCode, message: String },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(String),
}

/// Errors of a session operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Terminal(#[from] SessionError),
    #[error("operation not allowed while {actual:?}, expected {expected}")]
    WrongStage {
        expected: &'static str,
        actual: Stage,
    },
    #[error(transparent)]
    InvalidForm(#[from] FormError),
    #[error("open the review page before confirming")]
    ReviewNotOpened,
    #[error("the spin was abandoned before it finished")]
    SpinAbandoned,
}

/// Errors of the wheel renderer.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WheelError {
    #[error("a wheel needs at least one segment")]
    NoSegments,
    #[error("winner index {index} out of range for {count} segments")]
    WinnerOutOfRange { index: usize, count: usize },
    #[error("the previous spin has not completed yet")]
    AlreadySpinning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_codes_map_to_taxonomy() {
        let err = SessionError::from(BackendError::Rejected {
            code: FailureCode::TokenInvalidOrUsed,
            message: "already used".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::TokenInvalidOrUsed);

        let err = SessionError::from(BackendError::Rejected {
            code: FailureCode::NoPrizesConfigured,
            message: "empty".to_string(),
        });
        assert_eq!(err, SessionError::NoPrizesConfigured);
    }

    #[test]
    fn other_failures_keep_raw_message() {
        let err = SessionError::from(BackendError::Server {
            status: 500,
            message: "db down".to_string(),
        });
        assert_eq!(err.kind().code(), "NETWORK_OR_SERVER_ERROR");
        assert!(err.to_string().contains("db down"));
    }
}
