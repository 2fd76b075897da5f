//! Crate-wide error taxonomy.
//!
//! Mutating operations report "not found" as `Ok(false)` rather than an
//! error; these variants cover everything else a caller can observe.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input, with a user-facing message.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, expired, or invalid session or reset token.
    #[error("Unauthorized")]
    Unauthorized,

    /// The record a caller asked for does not exist.
    #[error("Not found")]
    NotFound,

    /// A save failed. Reads fail open to empty state, but a write failure
    /// must surface so callers never mistake a lost update for success.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// An outbound notification could not be delivered.
    #[error("Notification delivery failed: {0}")]
    Notification(String),
}

pub type Result<T> = std::result::Result<T, Error>;
