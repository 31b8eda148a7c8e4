use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Pending invite already exists: {invite_id}")]
    DuplicateInvite { invite_id: String },
    #[error("Store failure: {0}")]
    Store(String),
}

// Transport and encoding failures are not classified further by the core;
// callers decide whether a Store error is worth retrying.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Store(err.to_string())
    }
}
