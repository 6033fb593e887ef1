use sdb_types::{CollectionKey, ObjectId};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket is not in the store's type registry.
    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionKey),

    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// An object with this id is already live.
    #[error("object already exists: {0}")]
    AlreadyExists(ObjectId),

    /// The bucket has assigned its last instance.
    #[error("no instances left in collection {0}")]
    BucketExhausted(CollectionKey),

    /// A modification tried to change the object's id.
    #[error("modification of {id} changed its id to {changed}")]
    IdMutated { id: ObjectId, changed: ObjectId },

    /// The built object does not carry the id the store assigned.
    #[error("object built for {expected} reports id {actual}")]
    IdMismatch { expected: ObjectId, actual: ObjectId },

    /// A secondary index rejected a lifecycle event.
    ///
    /// The triggering mutation has already been applied to the store and
    /// every other attached index has seen the event; the enclosing block
    /// step must be treated as failed.
    #[error("secondary index {index} failed: {source}")]
    SecondaryIndex {
        index: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap an index error raised from a lifecycle callback.
    pub fn secondary(
        index: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SecondaryIndex {
            index,
            source: Box::new(source),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
