//! Error types for the betround client
//!
//! Round errors are the tagged results every controller call resolves to.
//! The crate-level error wraps everything a session or the CLI can hit.

use crate::api::client::TransportError;
use std::fmt;

/// Why a round request was refused or failed.
///
/// The first six variants are decided locally, before any network call.
/// `NetworkError` and `ServerRejected` come back after the request was sent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoundError {
    #[error("Please enter a valid bet amount")]
    InvalidStake,

    #[error("Insufficient balance: stake {stake:.2} exceeds balance {balance:.2}")]
    InsufficientBalance { stake: f64, balance: f64 },

    #[error("A round is already in progress")]
    RoundAlreadyInFlight,

    #[error("No active round")]
    NoActiveRound,

    #[error("Nothing to cash out yet")]
    NotCashable,

    #[error("Invalid game parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{0}")]
    ServerRejected(String),
}

impl RoundError {
    /// True for errors raised before the request reached the transport.
    pub fn is_local(&self) -> bool {
        !matches!(self, RoundError::NetworkError(_) | RoundError::ServerRejected(_))
    }
}

/// Root error type for session and CLI operations
#[derive(Debug)]
pub enum BetRoundError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Round lifecycle errors
    Round(RoundError),

    /// Backend communication errors
    Transport(TransportError),

    /// Local statistics storage errors
    Storage(StorageError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    MissingRequired(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
    SaveFailed(String),
}

/// Local file storage errors
#[derive(Debug)]
pub enum StorageError {
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

impl fmt::Display for BetRoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetRoundError::Configuration(e) => write!(f, "Configuration error: {}", e),
            BetRoundError::Round(e) => write!(f, "Round error: {}", e),
            BetRoundError::Transport(e) => write!(f, "Transport error: {}", e),
            BetRoundError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::MissingRequired(field) => write!(f, "Missing required field: {}", field),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
            ConfigurationError::SaveFailed(msg) => write!(f, "Failed to save configuration: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl std::error::Error for BetRoundError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BetRoundError::Configuration(e) => Some(e),
            BetRoundError::Round(e) => Some(e),
            BetRoundError::Transport(e) => Some(e),
            BetRoundError::Storage(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigurationError {}
impl std::error::Error for StorageError {}

impl From<ConfigurationError> for BetRoundError {
    fn from(e: ConfigurationError) -> Self {
        BetRoundError::Configuration(e)
    }
}

impl From<RoundError> for BetRoundError {
    fn from(e: RoundError) -> Self {
        BetRoundError::Round(e)
    }
}

impl From<TransportError> for BetRoundError {
    fn from(e: TransportError) -> Self {
        BetRoundError::Transport(e)
    }
}

impl From<StorageError> for BetRoundError {
    fn from(e: StorageError) -> Self {
        BetRoundError::Storage(e)
    }
}

impl From<std::io::Error> for BetRoundError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => BetRoundError::Storage(StorageError::ReadFailed(e.to_string())),
            _ => BetRoundError::Storage(StorageError::WriteFailed(e.to_string())),
        }
    }
}

impl From<serde_json::Error> for BetRoundError {
    fn from(e: serde_json::Error) -> Self {
        BetRoundError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

// Convenience type alias for Results
pub type BetRoundResult<T> = Result<T, BetRoundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_are_flagged() {
        assert!(RoundError::InvalidStake.is_local());
        assert!(RoundError::NotCashable.is_local());
        assert!(!RoundError::NetworkError("timeout".into()).is_local());
        assert!(!RoundError::ServerRejected("nope".into()).is_local());
    }

    #[test]
    fn test_server_rejection_displays_message_verbatim() {
        let err = RoundError::ServerRejected("round already settled".to_string());
        assert_eq!(err.to_string(), "round already settled");
    }

    #[test]
    fn test_root_error_wraps_configuration() {
        let err: BetRoundError = ConfigurationError::MissingRequired("api.base_url".into()).into();
        assert_eq!(err.to_string(), "Configuration error: Missing required field: api.base_url");
        assert!(std::error::Error::source(&err).is_some());
    }
}
