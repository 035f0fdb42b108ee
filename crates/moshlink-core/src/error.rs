//! Error types for moshlink.

use thiserror::Error;

/// Main error type for moshlink operations.
///
/// Transport implementations report failures through this type; the session
/// driver classifies them with [`Error::kind`] to decide whether the event
/// loop keeps running.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction parameters. Only ever returned synchronously.
    #[error("{message}")]
    Validation { message: String },

    /// Send/receive fault in the transport layer.
    #[error("{message}")]
    Network { message: String },

    /// Authentication or decryption failure in the crypto layer.
    #[error("{message}")]
    Crypto { message: String, fatal: bool },

    /// Any other transport fault that has no recovery path.
    #[error("{message}")]
    Transport { message: String },

    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation, including a panic inside the driver.
    #[error("{message}")]
    Internal { message: String },
}

/// How the driver responds to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recoverable; reported as a network error and retried after a backoff.
    Network,
    /// Reported as a crypto error; ends the loop only when `fatal`.
    Crypto { fatal: bool },
    /// Always ends the loop.
    Unclassified,
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Error::Network {
            message: message.into(),
        }
    }

    /// Create a crypto error.
    pub fn crypto(message: impl Into<String>, fatal: bool) -> Self {
        Error::Crypto {
            message: message.into(),
            fatal,
        }
    }

    /// Create an unclassified transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Classify this error for the driver loop.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Network { .. } => FailureKind::Network,
            Error::Crypto { fatal, .. } => FailureKind::Crypto { fatal: *fatal },
            Error::Validation { .. }
            | Error::Transport { .. }
            | Error::Io(_)
            | Error::Internal { .. } => FailureKind::Unclassified,
        }
    }

    /// Returns true if the driver loop survives this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Network | FailureKind::Crypto { fatal: false }
        )
    }

    /// Returns true if this error ends the driver loop.
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

/// Convenience result type for moshlink operations.
pub type Result<T> = std::result::Result<T, Error>;
