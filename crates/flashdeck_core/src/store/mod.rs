//! Durable key/value store for cards and auxiliary app values.
//!
//! # Responsibility
//! - Define the `KeyValueStore` contract the card repository builds on.
//! - Provide the SQLite implementation and an in-memory test double.
//! - Surface every failure as a typed `StoreError`; nothing is swallowed.
//!
//! # Invariants
//! - Entries live in a namespace; only `clear_all` crosses namespaces.
//! - `get` distinguishes absent (`Ok(None)`) from corrupt (`Err(Serialization)`).
//! - `get_all` is strict: one undecodable entry fails the whole call.

pub mod codec;
mod kv_store;
mod memory;

pub use kv_store::{clear_all, KeyValueStore, SqliteKvStore, StorePage};
pub use memory::MemoryKvStore;

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Namespace holding `FlashCard` records keyed by card id.
pub const CARD_NAMESPACE: &str = "cards";
/// Namespace for auxiliary values owned by the presentation layer.
pub const APP_NAMESPACE: &str = "app";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error taxonomy for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Value could not be encoded to, or decoded from, its stored text.
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    /// Underlying database could not be opened or accessed.
    StorageUnavailable(DbError),
    /// Requested key is absent. Only returned by `require`.
    NotFound(String),
    /// Stored payload was written by a newer encoding than this binary reads.
    UnsupportedFormat {
        key: String,
        version: u32,
        latest_supported: u32,
    },
    /// `merge` needs JSON objects on both sides.
    NotMergeable(String),
    /// Empty key or namespace.
    InvalidKey(String),
    /// A `CancelToken` was signalled mid-operation.
    Cancelled,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization { key, source } => {
                write!(f, "failed to (de)serialize value at `{key}`: {source}")
            }
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::NotFound(key) => write!(f, "key not found: {key}"),
            Self::UnsupportedFormat {
                key,
                version,
                latest_supported,
            } => write!(
                f,
                "value at `{key}` uses format version {version}, newer than supported {latest_supported}"
            ),
            Self::NotMergeable(key) => {
                write!(f, "cannot merge into `{key}`: both values must be JSON objects")
            }
            Self::InvalidKey(message) => write!(f, "invalid key: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization { source, .. } => Some(source),
            Self::StorageUnavailable(err) => Some(err),
            Self::NotFound(_)
            | Self::UnsupportedFormat { .. }
            | Self::NotMergeable(_)
            | Self::InvalidKey(_)
            | Self::Cancelled => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageUnavailable(DbError::Sqlite(value))
    }
}

impl StoreError {
    /// Stable short code for log lines and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "serialization",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::NotMergeable(_) => "not_mergeable",
            Self::InvalidKey(_) => "invalid_key",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Shared cancellation flag for long listings.
///
/// Clones observe the same flag, so the UI can keep one and hand another to
/// the worker running `get_all_cancellable`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}

pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, StoreError};

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        assert!(matches!(worker.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn not_found_display_names_key() {
        let err = StoreError::NotFound("missing-key".to_string());
        assert_eq!(err.to_string(), "key not found: missing-key");
        assert_eq!(err.code(), "not_found");
    }
}
