//! Registration and seeding of the helper indexes.
//!
//! An index attached to a store that already holds objects has seen none of
//! their insert events. [`IndexRegistrar`] attaches the configured indexes and
//! then seeds them from a full scan of the store, so that from then on
//! incremental maintenance starts from correct state.
//!
//! Seeding always recomputes from scratch and overwrites the index: running
//! it twice, or after some inserts were already observed, never double
//! counts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, info, warn};

use sdb_store::{InMemoryObjectStore, ObjectStore};
use sdb_types::{AssetId, CollectionKey, ObjectId, ProtocolType, ShareAmount};

use crate::collateral::AmountInCollateralIndex;
use crate::config::IndexesConfig;
use crate::error::{IndexError, IndexResult};
use crate::next_ids::NextObjectIdsIndex;

const COLLATERAL: &str = "amount_in_collateral";
const NEXT_IDS: &str = "next_object_ids";

/// Owns the helper indexes, attaches them to a store and keeps them seeded.
///
/// The store dispatches lifecycle events to shared handles of the same
/// index instances; consumers read them through [`IndexRegistrar`] queries or
/// the read guards it hands out.
pub struct IndexRegistrar {
    config: IndexesConfig,
    amount_in_collateral: Option<Arc<RwLock<AmountInCollateralIndex>>>,
    next_object_ids: Option<Arc<RwLock<NextObjectIdsIndex>>>,
    started: bool,
}

impl std::fmt::Debug for IndexRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistrar")
            .field("config", &self.config)
            .field("amount_in_collateral", &self.amount_in_collateral.is_some())
            .field("next_object_ids", &self.next_object_ids.is_some())
            .field("started", &self.started)
            .finish()
    }
}

impl IndexRegistrar {
    pub fn new(config: IndexesConfig) -> Self {
        Self {
            amount_in_collateral: config
                .amount_in_collateral
                .then(|| Arc::new(RwLock::new(AmountInCollateralIndex::new()))),
            next_object_ids: config
                .next_object_ids
                .then(|| Arc::new(RwLock::new(NextObjectIdsIndex::new()))),
            config,
            started: false,
        }
    }

    pub fn plugin_name(&self) -> &'static str {
        "api_helper_indexes"
    }

    pub fn plugin_description(&self) -> &'static str {
        "Provides some helper indexes used by various API calls"
    }

    pub fn config(&self) -> &IndexesConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ---------------------------------------------------------------
    // Startup and seeding
    // ---------------------------------------------------------------

    /// Attach the enabled indexes to `store` and seed them from its contents.
    ///
    /// The collateral index observes the call-order bucket. The next-id index
    /// observes every registered bucket in a tracked space.
    pub fn startup(&mut self, store: &mut InMemoryObjectStore) -> IndexResult<()> {
        if self.started {
            return Err(IndexError::AlreadyStarted);
        }

        if let Some(index) = self.amount_in_collateral.clone() {
            let key = ProtocolType::CallOrder.key();
            if store.contains_collection(key) {
                store.attach(key, index)?;
            } else {
                warn!(
                    collection = %key,
                    "call order collection not registered; collateral index left detached"
                );
            }
            self.refresh_collateral(&*store)?;
        }

        if let Some(index) = self.next_object_ids.clone() {
            for key in store.collections() {
                if self.config.tracks_space(key.space) {
                    store.attach(key, index.clone())?;
                }
            }
            self.refresh_next_ids(&*store)?;
        }

        self.started = true;
        info!(
            plugin = self.plugin_name(),
            amount_in_collateral = self.amount_in_collateral.is_some(),
            next_object_ids = self.next_object_ids.is_some(),
            "helper indexes started"
        );
        Ok(())
    }

    /// Recompute the collateral index from a full scan of the call-order
    /// bucket, replacing its previous state.
    pub fn refresh_collateral<S: ObjectStore + ?Sized>(&self, store: &S) -> IndexResult<()> {
        let index = self
            .amount_in_collateral
            .as_ref()
            .ok_or(IndexError::IndexDisabled(COLLATERAL))?;

        let mut seeded = AmountInCollateralIndex::new();
        for obj in store.scan(ProtocolType::CallOrder.key()) {
            let order = obj.as_call_order().ok_or(IndexError::UnexpectedObject {
                index: COLLATERAL,
                id: obj.id(),
                kind: obj.kind(),
            })?;
            seeded.on_inserted(order)?;
        }

        let orders = seeded.live_orders();
        *index.write().expect("index lock poisoned") = seeded;
        info!(orders, "collateral index seeded");
        Ok(())
    }

    /// Recompute the next id of every tracked bucket and overwrite the
    /// next-id index with the result.
    ///
    /// Every refresh enumerates the store's type registry filtered to the
    /// tracked spaces, so buckets registered after startup are seeded too.
    /// Buckets the index held an entry for but the store no longer has are
    /// skipped and lose their entry. Returns the number of buckets seeded.
    pub fn refresh_next_ids<S: ObjectStore + ?Sized>(&self, store: &S) -> IndexResult<usize> {
        let index = self
            .next_object_ids
            .as_ref()
            .ok_or(IndexError::IndexDisabled(NEXT_IDS))?;

        let mut buckets: BTreeSet<CollectionKey> = store
            .collections()
            .into_iter()
            .filter(|key| self.config.tracks_space(key.space))
            .collect();
        buckets.extend(index.read().expect("index lock poisoned").tracked_buckets());

        let mut next_ids = BTreeMap::new();
        for key in buckets {
            if !store.contains_collection(key) {
                warn!(collection = %key, "bucket missing from store; skipped");
                continue;
            }
            next_ids.insert(key, next_instance(store, key)?);
        }

        let seeded = next_ids.len();
        index
            .write()
            .expect("index lock poisoned")
            .replace_all(next_ids);
        debug!(buckets = seeded, "next object ids refreshed");
        Ok(seeded)
    }

    /// Hook run after every applied block.
    pub fn on_applied_block<S: ObjectStore + ?Sized>(&self, store: &S) -> IndexResult<()> {
        if self.config.refresh_next_ids_on_block && self.next_object_ids.is_some() {
            self.refresh_next_ids(store)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Read API
    // ---------------------------------------------------------------

    pub fn get_amount_in_collateral(&self, asset: AssetId) -> IndexResult<ShareAmount> {
        Ok(self.collateral_guard()?.get_amount_in_collateral(asset))
    }

    pub fn get_backing_collateral(&self, asset: AssetId) -> IndexResult<ShareAmount> {
        Ok(self.collateral_guard()?.get_backing_collateral(asset))
    }

    pub fn get_next_id(&self, space_id: u8, type_id: u8) -> IndexResult<ObjectId> {
        self.next_object_ids_index()
            .ok_or(IndexError::IndexDisabled(NEXT_IDS))?
            .get_next_id(space_id, type_id)
    }

    /// Shared read access to the collateral index, if enabled.
    pub fn amount_in_collateral_index(
        &self,
    ) -> Option<RwLockReadGuard<'_, AmountInCollateralIndex>> {
        self.amount_in_collateral
            .as_ref()
            .map(|index| index.read().expect("index lock poisoned"))
    }

    /// Shared read access to the next-id index, if enabled.
    pub fn next_object_ids_index(&self) -> Option<RwLockReadGuard<'_, NextObjectIdsIndex>> {
        self.next_object_ids
            .as_ref()
            .map(|index| index.read().expect("index lock poisoned"))
    }

    fn collateral_guard(&self) -> IndexResult<RwLockReadGuard<'_, AmountInCollateralIndex>> {
        self.amount_in_collateral_index()
            .ok_or(IndexError::IndexDisabled(COLLATERAL))
    }
}

/// The next instance of `key`: the store's own counter when it keeps one,
/// otherwise one past the highest live instance.
///
/// The scan fallback cannot see erased objects, so it may be lower than the
/// counter of a store that erased its newest objects.
fn next_instance<S: ObjectStore + ?Sized>(store: &S, key: CollectionKey) -> IndexResult<u64> {
    if let Some(next) = store.next_instance(key) {
        return Ok(next);
    }
    match store.scan(key).iter().map(|obj| obj.id().instance()).max() {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or(IndexError::BucketExhausted(key)),
    }
}

#[cfg(test)]
mod tests {
    use sdb_store::{AccountObject, CallOrderObject, GenericObject, Object};

    use super::*;

    /// A store that hides one bucket from its type registry.
    struct Hiding {
        inner: InMemoryObjectStore,
        hidden: CollectionKey,
    }

    impl ObjectStore for Hiding {
        fn resolve(&self, id: &ObjectId) -> Option<Object> {
            self.inner.resolve(id)
        }

        fn collections(&self) -> Vec<CollectionKey> {
            self.inner
                .collections()
                .into_iter()
                .filter(|key| *key != self.hidden)
                .collect()
        }

        fn scan(&self, key: CollectionKey) -> Vec<Object> {
            self.inner.scan(key)
        }

        fn next_instance(&self, key: CollectionKey) -> Option<u64> {
            self.inner.next_instance(key)
        }
    }

    /// A store without a per-bucket counter, forcing the scan fallback.
    struct ScanOnly(InMemoryObjectStore);

    impl ObjectStore for ScanOnly {
        fn resolve(&self, id: &ObjectId) -> Option<Object> {
            self.0.resolve(id)
        }

        fn collections(&self) -> Vec<CollectionKey> {
            self.0.collections()
        }

        fn scan(&self, key: CollectionKey) -> Vec<Object> {
            self.0.scan(key)
        }
    }

    fn generic(space: u8, type_id: u8, instance: u64) -> Object {
        Object::from(GenericObject {
            id: ObjectId::new(space, type_id, instance),
        })
    }

    fn account(id: ObjectId) -> Object {
        Object::from(AccountObject {
            id,
            name: format!("account-{}", id.instance()),
        })
    }

    fn call_order(id: ObjectId, backing: AssetId, collateral: i64, debt: i64) -> Object {
        Object::from(CallOrderObject {
            id,
            borrower: ObjectId::new(1, 2, 0),
            collateral: ShareAmount::new(collateral),
            debt: ShareAmount::new(debt),
            collateral_type: backing,
            debt_type: AssetId::new(1),
        })
    }

    /// Store with objects at instances 0..=4 of bucket (1,2) and nothing
    /// attached.
    fn prepopulated() -> InMemoryObjectStore {
        let mut store = InMemoryObjectStore::with_default_collections();
        for _ in 0..5 {
            store
                .create(ProtocolType::Account.key(), account)
                .unwrap();
        }
        store
    }

    #[test]
    fn plugin_metadata() {
        let registrar = IndexRegistrar::new(IndexesConfig::default());
        assert_eq!(registrar.plugin_name(), "api_helper_indexes");
        assert!(!registrar.plugin_description().is_empty());
        assert!(!registrar.is_started());
    }

    #[test]
    fn attach_after_data_seeds_next_id() {
        let mut store = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        assert_eq!(registrar.get_next_id(1, 2).unwrap(), ObjectId::new(1, 2, 5));
        // Empty registered buckets are seeded at zero.
        assert_eq!(registrar.get_next_id(1, 8).unwrap(), ObjectId::new(1, 8, 0));
    }

    #[test]
    fn startup_attaches_to_tracked_buckets() {
        let mut store = InMemoryObjectStore::with_default_collections();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        // Call orders are observed by both indexes.
        assert_eq!(store.attached_count(ProtocolType::CallOrder.key()), 2);
        assert_eq!(store.attached_count(ProtocolType::Account.key()), 1);
        assert!(registrar.is_started());
    }

    #[test]
    fn startup_twice_fails() {
        let mut store = InMemoryObjectStore::with_default_collections();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();
        assert!(matches!(
            registrar.startup(&mut store),
            Err(IndexError::AlreadyStarted)
        ));
    }

    #[test]
    fn untracked_spaces_are_not_seeded() {
        let mut store = prepopulated();
        store.register_collection(CollectionKey::new(2, 0));
        let config = IndexesConfig {
            tracked_spaces: vec![1],
            ..Default::default()
        };
        let mut registrar = IndexRegistrar::new(config);
        registrar.startup(&mut store).unwrap();

        assert!(registrar.get_next_id(1, 2).is_ok());
        assert!(matches!(
            registrar.get_next_id(2, 0),
            Err(IndexError::UnseededBucket(_))
        ));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut store = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        let first = registrar.refresh_next_ids(&store).unwrap();
        let snapshot: Vec<ObjectId> = store
            .collections()
            .iter()
            .map(|k| registrar.get_next_id(k.space, k.type_id).unwrap())
            .collect();
        let second = registrar.refresh_next_ids(&store).unwrap();
        let again: Vec<ObjectId> = store
            .collections()
            .iter()
            .map(|k| registrar.get_next_id(k.space, k.type_id).unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
    }

    #[test]
    fn scan_fallback_without_store_counter() {
        let mut inner = InMemoryObjectStore::with_default_collections();
        for instance in [0u64, 3, 11] {
            inner.insert(generic(1, 7, instance)).unwrap();
        }
        let store = ScanOnly(inner);

        let registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.refresh_next_ids(&store).unwrap();
        assert_eq!(registrar.get_next_id(1, 7).unwrap(), ObjectId::new(1, 7, 12));
        assert_eq!(registrar.get_next_id(1, 2).unwrap(), ObjectId::new(1, 2, 0));
    }

    #[test]
    fn scan_fallback_rejects_last_instance() {
        let mut inner = InMemoryObjectStore::with_default_collections();
        inner.insert(generic(1, 7, u64::MAX)).unwrap();
        let store = ScanOnly(inner);

        let registrar = IndexRegistrar::new(IndexesConfig::default());
        assert!(matches!(
            registrar.refresh_next_ids(&store),
            Err(IndexError::BucketExhausted(key)) if key == CollectionKey::new(1, 7)
        ));
    }

    #[test]
    fn refresh_discovers_buckets_registered_after_startup() {
        let mut store = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        let key = ProtocolType::Htlc.key();
        store.register_collection(key);
        store.insert(generic(key.space, key.type_id, 3)).unwrap();
        registrar.refresh_next_ids(&store).unwrap();
        assert_eq!(registrar.get_next_id(1, 16).unwrap(), ObjectId::new(1, 16, 4));
    }

    #[test]
    fn refresh_skips_bucket_missing_from_store() {
        let mut inner = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut inner).unwrap();
        assert!(registrar.get_next_id(1, 2).is_ok());

        let store = Hiding {
            inner,
            hidden: ProtocolType::Account.key(),
        };
        let seeded = registrar.refresh_next_ids(&store).unwrap();

        assert_eq!(seeded, store.collections().len());
        assert!(matches!(
            registrar.get_next_id(1, 2),
            Err(IndexError::UnseededBucket(_))
        ));
        assert_eq!(registrar.get_next_id(1, 8).unwrap(), ObjectId::new(1, 8, 0));
    }

    #[test]
    fn late_rebuild_does_not_double_count() {
        let mut store = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        let key = ProtocolType::CallOrder.key();
        store
            .create(key, |id| call_order(id, AssetId::CORE, 100, 10))
            .unwrap();
        store
            .create(key, |id| call_order(id, AssetId::CORE, 50, 5))
            .unwrap();

        registrar.refresh_collateral(&store).unwrap();
        registrar.refresh_next_ids(&store).unwrap();

        assert_eq!(
            registrar.get_amount_in_collateral(AssetId::CORE).unwrap(),
            ShareAmount::new(150)
        );
        assert_eq!(
            registrar.get_backing_collateral(AssetId::CORE).unwrap(),
            ShareAmount::new(15)
        );
        assert_eq!(registrar.get_next_id(1, 8).unwrap(), ObjectId::new(1, 8, 2));
    }

    #[test]
    fn collateral_seeded_from_existing_orders() {
        let mut store = InMemoryObjectStore::with_default_collections();
        let key = ProtocolType::CallOrder.key();
        let asset = AssetId::new(4);
        store
            .create(key, |id| call_order(id, asset, 300, 100))
            .unwrap();
        let existing = store
            .create(key, |id| call_order(id, asset, 200, 50))
            .unwrap();

        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();
        assert_eq!(
            registrar.get_amount_in_collateral(asset).unwrap(),
            ShareAmount::new(500)
        );

        // Pre-existing orders can be removed after seeding.
        store.remove(&existing).unwrap();
        assert_eq!(
            registrar.get_amount_in_collateral(asset).unwrap(),
            ShareAmount::new(300)
        );
        assert_eq!(
            registrar.get_backing_collateral(asset).unwrap(),
            ShareAmount::new(100)
        );
    }

    #[test]
    fn disabled_indexes_report_errors() {
        let mut store = InMemoryObjectStore::with_default_collections();
        let mut registrar = IndexRegistrar::new(IndexesConfig::disabled());
        registrar.startup(&mut store).unwrap();

        assert_eq!(store.attached_count(ProtocolType::CallOrder.key()), 0);
        assert!(matches!(
            registrar.get_amount_in_collateral(AssetId::CORE),
            Err(IndexError::IndexDisabled("amount_in_collateral"))
        ));
        assert!(matches!(
            registrar.get_next_id(1, 2),
            Err(IndexError::IndexDisabled("next_object_ids"))
        ));
        assert!(registrar.amount_in_collateral_index().is_none());
        // No refresh happens when nothing is enabled.
        registrar.on_applied_block(&store).unwrap();
    }

    #[test]
    fn applied_block_refreshes_next_ids() {
        let mut store = prepopulated();
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        registrar
            .next_object_ids
            .as_ref()
            .unwrap()
            .write()
            .unwrap()
            .replace_all(BTreeMap::new());
        registrar.on_applied_block(&store).unwrap();
        assert_eq!(registrar.get_next_id(1, 2).unwrap(), ObjectId::new(1, 2, 5));
    }

    #[test]
    fn missing_call_order_bucket_leaves_collateral_detached() {
        let mut store = InMemoryObjectStore::new();
        store.register_collection(ProtocolType::Account.key());
        let mut registrar = IndexRegistrar::new(IndexesConfig::default());
        registrar.startup(&mut store).unwrap();

        assert_eq!(
            registrar.get_amount_in_collateral(AssetId::CORE).unwrap(),
            ShareAmount::ZERO
        );
        assert!(registrar.get_next_id(1, 8).is_err());
    }
}
