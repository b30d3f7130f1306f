use thiserror::Error;

use crate::types::AlarmId;

#[derive(Debug, Error)]
pub enum AlarmError {
    /// The platform has not granted the right to register exact wake-ups.
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Alarm not found: {id}")]
    NotFound { id: AlarmId },

    #[error("Notification presentation failed: {0}")]
    Presentation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Scheduling backend error: {0}")]
    Backend(String),

    /// Time-of-day components that do not form a wall-clock time (e.g. 24:00).
    #[error("Invalid time of day: {hour:02}:{minute:02}:{second:02}.{millis:03}")]
    InvalidTime {
        hour: u8,
        minute: u8,
        second: u8,
        millis: u16,
    },

    #[error("Invalid notification target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AlarmError {
    /// Stable code for logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            AlarmError::PermissionDenied { .. } => "PERMISSION_DENIED",
            AlarmError::NotFound { .. } => "NOT_FOUND",
            AlarmError::Presentation(_) => "PRESENTATION_FAILURE",
            AlarmError::Serialization(_) => "SERIALIZATION_FAILURE",
            AlarmError::Store(_) => "STORE_ERROR",
            AlarmError::Backend(_) => "BACKEND_ERROR",
            AlarmError::InvalidTime { .. } => "INVALID_TIME",
            AlarmError::InvalidTarget(_) => "INVALID_TARGET",
            AlarmError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AlarmError::PermissionDenied { .. })
    }
}

impl From<serde_json::Error> for AlarmError {
    fn from(e: serde_json::Error) -> Self {
        AlarmError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AlarmError>;
