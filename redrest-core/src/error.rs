use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`RedisError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Command,
    Codec,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Command => "command",
            ErrorKind::Codec => "codec",
        };
        write!(f, "{}", s)
    }
}

/// Failure of a whole request before a per-command result was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        TransportError::Http {
            status,
            message: message.into(),
        }
    }

    /// Network failures, timeouts and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Http { status, .. } => *status >= 500,
            TransportError::Protocol(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Every failure a caller can observe for a command.
///
/// Errors are `Clone` because a single transport failure settles every
/// command of the batch it hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedisError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{message}")]
    Command { message: String },
    #[error("Codec error: {0}")]
    Codec(String),
}

impl RedisError {
    pub fn validation(message: impl Into<String>) -> Self {
        RedisError::Validation(message.into())
    }

    pub fn command(message: impl Into<String>) -> Self {
        RedisError::Command {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        RedisError::Codec(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RedisError::Validation(_) => ErrorKind::Validation,
            RedisError::Transport(_) => ErrorKind::Transport,
            RedisError::Command { .. } => ErrorKind::Command,
            RedisError::Codec(_) => ErrorKind::Codec,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RedisError::Transport(err) if err.is_retryable())
    }
}

impl From<serde_json::Error> for RedisError {
    fn from(err: serde_json::Error) -> Self {
        RedisError::codec(format!("JSON error: {}", err))
    }
}
