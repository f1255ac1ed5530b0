use thiserror::Error;

/// SQLSTATE raised by PostgreSQL when an exclusion constraint rejects a row.
pub const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("Record not found")]
    NotFound,

    #[error("Record was modified concurrently: {0}")]
    Conflict(String),

    #[error("Row overlaps an existing reservation")]
    Overlap,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatabaseError::Decode(err.to_string())
        } else {
            DatabaseError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Decode(err.to_string())
    }
}
