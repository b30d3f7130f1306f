use chime_core::AlarmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for AlarmError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => AlarmError::Store(e.to_string()),
            StoreError::Serialization(e) => AlarmError::Serialization(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
