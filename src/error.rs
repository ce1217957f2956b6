//! Error types shared by the session manager, the store and the verifier.
//!
//! Only login and register surface these to a user; passive checks
//! (hydration, profile refresh) collapse every variant into "anonymous".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage contains invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Lock,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    /// The backend answered with a non-success status (bad credentials,
    /// validation failure, expired token).
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
    /// A logout happened while the request was in flight.
    #[error("Signed out before the request completed")]
    Superseded,
}

impl AuthError {
    /// True when the backend rejected the request itself rather than the
    /// request never completing.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}
