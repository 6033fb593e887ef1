use std::collections::BTreeMap;

use tracing::debug;

use sdb_store::{Object, SecondaryIndex, StoreError, StoreResult};
use sdb_types::{CollectionKey, ObjectId};

use crate::error::{IndexError, IndexResult};

const NAME: &str = "next_object_ids";

/// Tracks the next unused instance of every `(space, type)` bucket.
///
/// The value for a bucket is one past the highest instance ever created in
/// it. Erasing objects never lowers it, since ids are never reused.
///
/// A single instance observes many buckets. Buckets it has not seen an
/// insert for, and that no rebuild has seeded, have no entry.
#[derive(Debug, Default)]
pub struct NextObjectIdsIndex {
    next_ids: BTreeMap<CollectionKey, u64>,
}

impl NextObjectIdsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the bucket `(space_id, type_id)` will assign next.
    pub fn get_next_id(&self, space_id: u8, type_id: u8) -> IndexResult<ObjectId> {
        let key = CollectionKey::new(space_id, type_id);
        self.next_ids
            .get(&key)
            .map(|&next| key.object(next))
            .ok_or(IndexError::UnseededBucket(key))
    }

    /// Record that `id` was created.
    ///
    /// In normal operation `id` is exactly the bucket's current next id; the
    /// `max` keeps replayed or out-of-order inserts from moving it back. An
    /// id at the last instance leaves no next id and is an error.
    pub fn observe(&mut self, id: ObjectId) -> IndexResult<()> {
        let next = id
            .instance()
            .checked_add(1)
            .ok_or(IndexError::BucketExhausted(id.collection()))?;
        let entry = self.next_ids.entry(id.collection()).or_default();
        *entry = (*entry).max(next);
        Ok(())
    }

    /// Overwrite all state with the result of a rebuild scan.
    pub fn replace_all(&mut self, next_ids: BTreeMap<CollectionKey, u64>) {
        debug!(buckets = next_ids.len(), "next object ids replaced");
        self.next_ids = next_ids;
    }

    /// Buckets with a known next id, ascending.
    pub fn tracked_buckets(&self) -> Vec<CollectionKey> {
        self.next_ids.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.next_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_ids.is_empty()
    }
}

impl SecondaryIndex for NextObjectIdsIndex {
    fn name(&self) -> &'static str {
        NAME
    }

    fn object_inserted(&mut self, obj: &Object) -> StoreResult<()> {
        self.observe(obj.id())
            .map_err(|e| StoreError::secondary(NAME, e))
    }
}
