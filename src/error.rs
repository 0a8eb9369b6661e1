//! Error types for the annotation core

use thiserror::Error;

/// Crate-wide result type, defaulting to sync failures
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Failures while resolving a selection into verse offsets.
///
/// None of these are fatal: the caller drops the pending highlight action
/// and clears the selection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetError {
    #[error("Selection is empty")]
    EmptySelection,

    #[error("Selection does not form a valid range")]
    InvalidRange,

    #[error("Selection is not attached to the verse container")]
    DetachedContainer,
}

/// Failures talking to the note/highlight service.
///
/// The store is never touched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication required")]
    Auth,

    #[error("{message}")]
    Validation {
        /// HTTP status, `None` when rejected before sending
        status: Option<u16>,
        message: String,
    },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl SyncError {
    /// Map a non-success HTTP status and its extracted message to an error
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => SyncError::Auth,
            400..=499 => SyncError::Validation {
                status: Some(status),
                message,
            },
            _ => SyncError::Server { status, message },
        }
    }

    /// Rejection raised locally, before any request is made
    pub fn invalid(message: impl Into<String>) -> Self {
        SyncError::Validation {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the session should be treated as expired
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return SyncError::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return SyncError::Server {
                status: 200,
                message: format!("Malformed response: {}", err),
            };
        }
        SyncError::Network(err.to_string())
    }
}

/// Invalid environment configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SyncError::from_status(401, "nope".into()), SyncError::Auth);
        assert_eq!(
            SyncError::from_status(422, "Content too long".into()),
            SyncError::Validation {
                status: Some(422),
                message: "Content too long".into()
            }
        );
        assert!(matches!(
            SyncError::from_status(503, "down".into()),
            SyncError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn test_validation_message_is_user_facing() {
        let err = SyncError::invalid("Color is required");
        assert_eq!(err.to_string(), "Color is required");
        assert!(!err.is_auth());
    }
}
