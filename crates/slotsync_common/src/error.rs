// --- File: crates/slotsync_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for the availability sync core.
///
/// Variants carry rendered messages rather than source errors so the type stays
/// `Clone`: a single coalesced fetch hands the same outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotSyncError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// A live-feed frame did not match the wire protocol
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The live-feed connection could not be opened or was lost
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// A concurrent booking invalidated the requested slot
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SlotSyncError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SlotSyncError::HttpError(_)
                | SlotSyncError::ConnectionError(_)
                | SlotSyncError::ExternalServiceError { .. }
                | SlotSyncError::TimeoutError(_)
        )
    }
}

// Common error conversions
impl From<reqwest::Error> for SlotSyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlotSyncError::TimeoutError(err.to_string())
        } else {
            SlotSyncError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlotSyncError {
    fn from(err: serde_json::Error) -> Self {
        SlotSyncError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for SlotSyncError {
    fn from(err: std::io::Error) -> Self {
        SlotSyncError::InternalError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> SlotSyncError {
    SlotSyncError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> SlotSyncError {
    SlotSyncError::ValidationError(message.to_string())
}

pub fn protocol_error<T: fmt::Display>(message: T) -> SlotSyncError {
    SlotSyncError::ProtocolError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> SlotSyncError {
    SlotSyncError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> SlotSyncError {
    SlotSyncError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> SlotSyncError {
    SlotSyncError::InternalError(message.to_string())
}
