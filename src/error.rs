//! Error types for pantry_sync
//!
//! Only unauthorized access and storage failures cross component boundaries;
//! expected business conditions (quantity below 1, a lost insert race) are
//! handled internally and never surface here.

use thiserror::Error;

/// Unified error type for pantry_sync operations
#[derive(Debug, Error)]
pub enum PantryError {
    /// Caller is not a member of the household
    #[error("not a member of household {0}")]
    Unauthorized(i64),
    /// Referenced household, item, or entry does not exist
    #[error("{0} not found")]
    NotFound(String),
    /// Joining a household the caller already belongs to
    #[error("already a member of this household")]
    AlreadyMember,
    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result alias for pantry_sync operations
pub type Result<T> = std::result::Result<T, PantryError>;
