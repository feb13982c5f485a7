//! Error types for stockwatch.

use std::fmt;
use std::time::Duration;

/// Result type alias for stockwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while tracking products or mutating configuration.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to load process settings.
    #[error("Failed to load settings: {0}")]
    SettingsError(String),

    /// A configuration failed validation and was not applied.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A persisted snapshot could not be encoded or decoded.
    #[error("Snapshot {path} is unreadable: {source}")]
    SnapshotError {
        /// Path of the snapshot file
        path: String,
        /// Underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// A product page could not be turned into an offer.
    #[error("When fetching {url}: {reason}")]
    FetchError {
        /// Source URL of the product
        url: String,
        /// Why the page yielded no offer
        reason: String,
    },

    /// A message could not be delivered to a channel.
    #[error("Cannot send message to channel {channel}: {reason}")]
    DeliveryError {
        /// Target channel identifier
        channel: String,
        /// Transport-specific reason
        reason: String,
    },

    /// An external call did not finish within its budget.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// What was being attempted, including its target
        operation: String,
        /// The budget that was exceeded
        elapsed: Duration,
    },
}

impl WatchError {
    /// Create a fetch error for a product URL.
    pub fn fetch(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::FetchError {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a delivery error for a channel.
    pub fn delivery(channel: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::DeliveryError {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a configuration value was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Free-form rejection.
    #[error("{0}")]
    Custom(String),

    /// A specific field has an invalid value.
    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        /// The field name
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Several fields were rejected at once.
    #[error("{}", numbered(.0))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a free-form validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Fold a list of errors into one, or `Ok` when the list is empty.
    pub fn collect(mut errors: Vec<ValidationError>) -> std::result::Result<(), ValidationError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }
}

fn numbered(errors: &[ValidationError]) -> String {
    let mut text = String::from("Multiple validation errors:");
    for (i, err) in errors.iter().enumerate() {
        text.push_str(&format!("\n  {}. {}", i + 1, err));
    }
    text
}

impl From<ValidationError> for WatchError {
    fn from(err: ValidationError) -> Self {
        WatchError::ValidationError(err.to_string())
    }
}

impl From<config::ConfigError> for WatchError {
    fn from(err: config::ConfigError) -> Self {
        WatchError::SettingsError(err.to_string())
    }
}
