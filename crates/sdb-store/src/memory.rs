use std::collections::BTreeMap;

use tracing::{debug, warn};

use sdb_types::{CollectionKey, ImplementationType, ObjectId, ProtocolType};

use crate::error::{StoreError, StoreResult};
use crate::object::Object;
use crate::secondary::SharedIndex;
use crate::traits::ObjectStore;

/// One `(space, type)` bucket: its live objects, its instance counter, and
/// the secondary indexes observing it.
#[derive(Default)]
struct Collection {
    next_instance: u64,
    exhausted: bool,
    objects: BTreeMap<u64, Object>,
    indexes: Vec<SharedIndex>,
}

#[derive(Clone, Copy, Debug)]
enum Event {
    Inserted,
    Removed,
    AboutToModify,
    Modified,
}

/// Deliver `event` to every index, even after one of them rejects it, and
/// return the first rejection.
fn dispatch(indexes: &[SharedIndex], event: Event, obj: &Object) -> StoreResult<()> {
    let mut first_error = None;
    for index in indexes {
        let mut index = index.write().expect("index lock poisoned");
        let result = match event {
            Event::Inserted => index.object_inserted(obj),
            Event::Removed => index.object_removed(obj),
            Event::AboutToModify => index.about_to_modify(obj),
            Event::Modified => index.object_modified(obj),
        };
        if let Err(e) = result {
            warn!(
                index = index.name(),
                id = %obj.id(),
                ?event,
                error = %e,
                "secondary index rejected event"
            );
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// In-memory, `BTreeMap`-based object store.
///
/// Holds one [`Collection`] per registered bucket. Mutations take `&mut self`:
/// the store is driven by a single writer applying one operation at a time,
/// and every attached index sees each event before the mutation returns.
///
/// There is no undo layer. Every attached index sees every event and the
/// mutation is always applied, even when an index rejects the event; the
/// first rejection is returned to the caller afterwards.
#[derive(Default)]
pub struct InMemoryObjectStore {
    collections: BTreeMap<CollectionKey, Collection>,
}

impl InMemoryObjectStore {
    /// Create a store with an empty type registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the buckets a chain database registers at genesis.
    pub fn with_default_collections() -> Self {
        let mut store = Self::new();
        for kind in [
            ProtocolType::Account,
            ProtocolType::Asset,
            ProtocolType::CommitteeMember,
            ProtocolType::Witness,
            ProtocolType::LimitOrder,
            ProtocolType::CallOrder,
            ProtocolType::Proposal,
        ] {
            store.register_collection(kind.key());
        }
        for kind in ImplementationType::ALL {
            store.register_collection(kind.key());
        }
        store
    }

    /// Add a bucket to the type registry. Returns `false` if it was already
    /// registered.
    pub fn register_collection(&mut self, key: CollectionKey) -> bool {
        if self.collections.contains_key(&key) {
            return false;
        }
        self.collections.insert(key, Collection::default());
        debug!(collection = %key, "registered collection");
        true
    }

    /// Attach a secondary index to a registered bucket.
    ///
    /// Several indexes may observe the same bucket; they are invoked in
    /// attachment order, and must not depend on that order.
    pub fn attach(&mut self, key: CollectionKey, index: SharedIndex) -> StoreResult<()> {
        let collection = self
            .collections
            .get_mut(&key)
            .ok_or(StoreError::UnknownCollection(key))?;
        let name = index.read().expect("index lock poisoned").name();
        collection.indexes.push(index);
        debug!(collection = %key, index = name, "attached secondary index");
        Ok(())
    }

    /// Number of indexes attached to a bucket.
    pub fn attached_count(&self, key: CollectionKey) -> usize {
        self.collections
            .get(&key)
            .map_or(0, |c| c.indexes.len())
    }

    /// Total number of live objects across all buckets.
    pub fn len(&self) -> usize {
        self.collections.values().map(|c| c.objects.len()).sum()
    }

    /// Returns `true` if no bucket holds a live object.
    pub fn is_empty(&self) -> bool {
        self.collections.values().all(|c| c.objects.is_empty())
    }

    /// Number of live objects in one bucket.
    pub fn len_of(&self, key: CollectionKey) -> usize {
        self.collections.get(&key).map_or(0, |c| c.objects.len())
    }

    /// Borrow a live object.
    pub fn get(&self, id: &ObjectId) -> Option<&Object> {
        self.collections
            .get(&id.collection())?
            .objects
            .get(&id.instance())
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Create a new object in `key`, assigning it the bucket's next instance.
    ///
    /// `build` receives the assigned id and must return an object carrying
    /// it. Fails with [`StoreError::BucketExhausted`] once the bucket has
    /// handed out its last instance.
    pub fn create<F>(&mut self, key: CollectionKey, build: F) -> StoreResult<ObjectId>
    where
        F: FnOnce(ObjectId) -> Object,
    {
        let collection = self
            .collections
            .get_mut(&key)
            .ok_or(StoreError::UnknownCollection(key))?;
        if collection.exhausted {
            return Err(StoreError::BucketExhausted(key));
        }
        let id = key.object(collection.next_instance);
        if collection.objects.contains_key(&id.instance()) {
            return Err(StoreError::AlreadyExists(id));
        }
        let object = build(id);
        if object.id() != id {
            return Err(StoreError::IdMismatch {
                expected: id,
                actual: object.id(),
            });
        }
        Self::insert_into(collection, object)
    }

    /// Insert an object under its own id, as when loading or replaying state.
    ///
    /// The bucket's counter moves to `max(counter, instance + 1)`. Inserting
    /// at `u64::MAX` exhausts the bucket.
    pub fn insert(&mut self, object: Object) -> StoreResult<ObjectId> {
        let key = object.collection();
        let collection = self
            .collections
            .get_mut(&key)
            .ok_or(StoreError::UnknownCollection(key))?;
        if collection.objects.contains_key(&object.id().instance()) {
            return Err(StoreError::AlreadyExists(object.id()));
        }
        Self::insert_into(collection, object)
    }

    fn insert_into(collection: &mut Collection, object: Object) -> StoreResult<ObjectId> {
        let id = object.id();
        let instance = id.instance();
        match instance.checked_add(1) {
            Some(next) => collection.next_instance = collection.next_instance.max(next),
            None => {
                collection.next_instance = u64::MAX;
                collection.exhausted = true;
                warn!(collection = %id.collection(), "instance space exhausted");
            }
        }
        collection.objects.insert(instance, object);
        debug!(%id, "object inserted");

        let stored = &collection.objects[&instance];
        dispatch(&collection.indexes, Event::Inserted, stored)?;
        Ok(id)
    }

    /// Modify a live object in place.
    ///
    /// Attached indexes see `about_to_modify` with the old state and then
    /// `object_modified` with the new one. The mutation may not change the
    /// object's id.
    pub fn modify<F>(&mut self, id: &ObjectId, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Object),
    {
        let collection = self
            .collections
            .get_mut(&id.collection())
            .ok_or(StoreError::NotFound(*id))?;
        let current = collection
            .objects
            .get(&id.instance())
            .ok_or(StoreError::NotFound(*id))?;

        let mut updated = current.clone();
        mutate(&mut updated);
        if updated.id() != *id {
            return Err(StoreError::IdMutated {
                id: *id,
                changed: updated.id(),
            });
        }

        let about = dispatch(&collection.indexes, Event::AboutToModify, current);
        collection.objects.insert(id.instance(), updated);
        debug!(%id, "object modified");

        let stored = &collection.objects[&id.instance()];
        let modified = dispatch(&collection.indexes, Event::Modified, stored);
        about.and(modified)
    }

    /// Erase a live object and return its last state.
    ///
    /// Indexes see `object_removed` while the object is still stored. The
    /// bucket's counter is untouched: instances are never reused.
    pub fn remove(&mut self, id: &ObjectId) -> StoreResult<Object> {
        let collection = self
            .collections
            .get_mut(&id.collection())
            .ok_or(StoreError::NotFound(*id))?;
        let current = collection
            .objects
            .get(&id.instance())
            .ok_or(StoreError::NotFound(*id))?;

        let notified = dispatch(&collection.indexes, Event::Removed, current);
        let removed = collection
            .objects
            .remove(&id.instance())
            .ok_or(StoreError::NotFound(*id))?;
        debug!(%id, "object removed");
        notified.map(|()| removed)
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn resolve(&self, id: &ObjectId) -> Option<Object> {
        self.get(id).cloned()
    }

    fn collections(&self) -> Vec<CollectionKey> {
        self.collections.keys().copied().collect()
    }

    fn scan(&self, key: CollectionKey) -> Vec<Object> {
        self.collections
            .get(&key)
            .map(|c| c.objects.values().cloned().collect())
            .unwrap_or_default()
    }

    fn next_instance(&self, key: CollectionKey) -> Option<u64> {
        self.collections.get(&key).map(|c| c.next_instance)
    }

    fn contains_collection(&self, key: CollectionKey) -> bool {
        self.collections.contains_key(&key)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("collection_count", &self.collections.len())
            .field("object_count", &self.len())
            .finish()
    }
}
