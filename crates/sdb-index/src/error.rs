//! Error types for the index crate.

use sdb_types::{CollectionKey, ObjectId};

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Derived state no longer matches the events observed. Fatal for the
    /// mutation in progress; values are never clamped.
    #[error("{index} invariant violated: {reason}")]
    InvariantViolation { index: &'static str, reason: String },

    /// An index received an object it does not track.
    #[error("{index} cannot track {kind} object {id}")]
    UnexpectedObject {
        index: &'static str,
        id: ObjectId,
        kind: &'static str,
    },

    /// The next id of a bucket was queried before any rebuild seeded it.
    #[error("next id for bucket {0} has not been seeded")]
    UnseededBucket(CollectionKey),

    /// A bucket's instance space has no id left past the one observed.
    #[error("bucket {0} has no instances left")]
    BucketExhausted(CollectionKey),

    /// The index is turned off in the configuration.
    #[error("index disabled: {0}")]
    IndexDisabled(&'static str),

    /// The registrar has already attached its indexes.
    #[error("indexes already started")]
    AlreadyStarted,

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] sdb_store::StoreError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
