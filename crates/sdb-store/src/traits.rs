use sdb_types::{CollectionKey, ObjectId};

use crate::object::Object;

/// Read boundary of the object store, as consumed by index seeding.
///
/// All implementations must satisfy these invariants:
/// - `collections()` and `scan()` return results in ascending order, so
///   every node derives identical state from the same contents.
/// - Instances are never reused within a bucket.
pub trait ObjectStore: Send + Sync {
    /// Look up a live object by id.
    ///
    /// For indexes and callers that dereference ids embedded in objects.
    /// Seeding reads whole buckets through `scan()` instead.
    fn resolve(&self, id: &ObjectId) -> Option<Object>;

    /// Every bucket in the store's type registry, ascending.
    fn collections(&self) -> Vec<CollectionKey>;

    /// Live objects of one bucket, ascending by instance.
    ///
    /// Returns an empty vec for an unknown bucket.
    fn scan(&self, key: CollectionKey) -> Vec<Object>;

    /// The instance the bucket will assign to its next object.
    ///
    /// This is the cheap path for index seeding. Backends that do not keep a
    /// per-bucket counter return `None` and seeding falls back to `scan()`.
    fn next_instance(&self, _key: CollectionKey) -> Option<u64> {
        None
    }

    /// Returns `true` if the bucket is in the type registry.
    fn contains_collection(&self, key: CollectionKey) -> bool {
        self.collections().contains(&key)
    }
}
