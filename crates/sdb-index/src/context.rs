use tracing::debug;

use sdb_store::{InMemoryObjectStore, Object, StoreResult};
use sdb_types::{CollectionKey, ObjectId};

use crate::config::IndexesConfig;
use crate::error::IndexResult;
use crate::registrar::IndexRegistrar;

/// An object store together with its started helper indexes.
///
/// This is the explicit context handed to code that mutates objects or
/// queries the indexes. Mutations go through the store, which dispatches to
/// the attached indexes; [`apply_block`](Self::apply_block) additionally runs
/// the registrar's end-of-block hook.
#[derive(Debug)]
pub struct IndexedDatabase {
    store: InMemoryObjectStore,
    registrar: IndexRegistrar,
}

impl IndexedDatabase {
    /// Take ownership of `store`, attach the configured indexes to it and
    /// seed them from its current contents.
    pub fn open(mut store: InMemoryObjectStore, config: IndexesConfig) -> IndexResult<Self> {
        let mut registrar = IndexRegistrar::new(config);
        registrar.startup(&mut store)?;
        Ok(Self { store, registrar })
    }

    pub fn store(&self) -> &InMemoryObjectStore {
        &self.store
    }

    pub fn registrar(&self) -> &IndexRegistrar {
        &self.registrar
    }

    pub fn create<F>(&mut self, key: CollectionKey, build: F) -> IndexResult<ObjectId>
    where
        F: FnOnce(ObjectId) -> Object,
    {
        Ok(self.store.create(key, build)?)
    }

    pub fn insert(&mut self, object: Object) -> IndexResult<ObjectId> {
        Ok(self.store.insert(object)?)
    }

    pub fn modify<F>(&mut self, id: &ObjectId, mutate: F) -> IndexResult<()>
    where
        F: FnOnce(&mut Object),
    {
        Ok(self.store.modify(id, mutate)?)
    }

    pub fn remove(&mut self, id: &ObjectId) -> IndexResult<Object> {
        Ok(self.store.remove(id)?)
    }

    /// Apply one block's worth of mutations, then run the end-of-block hook.
    pub fn apply_block<F, T>(&mut self, apply: F) -> IndexResult<T>
    where
        F: FnOnce(&mut InMemoryObjectStore) -> StoreResult<T>,
    {
        let output = apply(&mut self.store)?;
        self.registrar.on_applied_block(&self.store)?;
        debug!(objects = self.store.len(), "block applied");
        Ok(output)
    }

    /// Recompute every enabled index from a full store scan.
    pub fn rebuild(&mut self) -> IndexResult<()> {
        if self.registrar.config().amount_in_collateral {
            self.registrar.refresh_collateral(&self.store)?;
        }
        if self.registrar.config().next_object_ids {
            self.registrar.refresh_next_ids(&self.store)?;
        }
        Ok(())
    }

    pub fn into_parts(self) -> (InMemoryObjectStore, IndexRegistrar) {
        (self.store, self.registrar)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use sdb_store::{CallOrderObject, GenericObject, ObjectStore, StoreError};
    use sdb_types::{AssetId, ProtocolType, ShareAmount};

    use super::*;
    use crate::error::IndexError;

    const A: AssetId = AssetId::new(0);
    const B: AssetId = AssetId::new(1);

    fn open() -> IndexedDatabase {
        IndexedDatabase::open(
            InMemoryObjectStore::with_default_collections(),
            IndexesConfig::default(),
        )
        .unwrap()
    }

    fn call_order(id: ObjectId, backing: AssetId, collateral: i64, debt: i64) -> Object {
        Object::from(CallOrderObject {
            id,
            borrower: ObjectId::new(1, 2, 0),
            collateral: ShareAmount::new(collateral),
            debt: ShareAmount::new(debt),
            collateral_type: backing,
            debt_type: AssetId::new(9),
        })
    }

    fn collateral(db: &IndexedDatabase, asset: AssetId) -> i64 {
        db.registrar()
            .get_amount_in_collateral(asset)
            .unwrap()
            .value()
    }

    #[test]
    fn modify_rebinding_asset_moves_collateral() {
        let mut db = open();
        let id = db
            .create(ProtocolType::CallOrder.key(), |id| call_order(id, A, 100, 30))
            .unwrap();

        db.modify(&id, |obj| {
            obj.as_call_order_mut().unwrap().collateral_type = B;
        })
        .unwrap();

        assert_eq!(collateral(&db, A), 0);
        assert_eq!(collateral(&db, B), 100);
        assert_eq!(
            db.registrar().get_backing_collateral(B).unwrap(),
            ShareAmount::new(30)
        );
    }

    #[test]
    fn removal_zeroes_totals() {
        let mut db = open();
        let id = db
            .create(ProtocolType::CallOrder.key(), |id| call_order(id, A, 50, 10))
            .unwrap();
        db.remove(&id).unwrap();

        assert_eq!(collateral(&db, A), 0);
        assert_eq!(
            db.registrar().get_backing_collateral(A).unwrap(),
            ShareAmount::ZERO
        );
    }

    #[test]
    fn next_id_follows_creates_and_survives_removal() {
        let mut db = open();
        let key = ProtocolType::Account.key();
        let generic = |id: ObjectId| Object::from(GenericObject { id });
        let first = db.create(ProtocolType::Proposal.key(), generic).unwrap();
        assert_eq!(
            db.registrar().get_next_id(1, 10).unwrap(),
            ObjectId::new(1, 10, 1)
        );

        db.remove(&first).unwrap();
        assert_eq!(
            db.registrar().get_next_id(1, 10).unwrap(),
            ObjectId::new(1, 10, 1)
        );
        assert_eq!(db.registrar().get_next_id(key.space, key.type_id).unwrap().instance(), 0);
    }

    #[test]
    fn apply_block_refreshes_and_returns_output() {
        let mut db = open();
        let created = db
            .apply_block(|store| {
                let key = ProtocolType::CallOrder.key();
                let a = store.create(key, |id| call_order(id, A, 10, 1))?;
                let b = store.create(key, |id| call_order(id, A, 20, 2))?;
                Ok(vec![a, b])
            })
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(collateral(&db, A), 30);
        assert_eq!(
            db.registrar().get_next_id(1, 8).unwrap(),
            ObjectId::new(1, 8, 2)
        );
    }

    #[test]
    fn corrupted_removal_surfaces_as_fatal_store_error() {
        let mut db = open();
        let id = db
            .create(ProtocolType::CallOrder.key(), |id| call_order(id, A, 50, 10))
            .unwrap();
        // Drop the index's knowledge of the order, as if it had been attached
        // without seeding.
        let (mut store, registrar) = db.into_parts();
        let scratch = InMemoryObjectStore::with_default_collections();
        registrar.refresh_collateral(&scratch).unwrap();

        let err = store.remove(&id).unwrap_err();
        match err {
            StoreError::SecondaryIndex { index, source } => {
                assert_eq!(index, "amount_in_collateral");
                assert!(matches!(
                    source.downcast_ref::<IndexError>(),
                    Some(IndexError::InvariantViolation { .. })
                ));
            }
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn rebuild_twice_keeps_state() {
        let mut db = open();
        db.create(ProtocolType::CallOrder.key(), |id| call_order(id, A, 70, 7))
            .unwrap();
        db.rebuild().unwrap();
        db.rebuild().unwrap();
        assert_eq!(collateral(&db, A), 70);
        assert_eq!(db.registrar().get_next_id(1, 8).unwrap().instance(), 1);
    }

    #[test]
    fn open_with_disabled_indexes() {
        let mut db = IndexedDatabase::open(
            InMemoryObjectStore::with_default_collections(),
            IndexesConfig::disabled(),
        )
        .unwrap();
        db.create(ProtocolType::CallOrder.key(), |id| call_order(id, A, 1, 1))
            .unwrap();
        db.rebuild().unwrap();
        assert!(db.registrar().get_amount_in_collateral(A).is_err());
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug)]
    enum Op {
        Create { backing: u8, collateral: i64, debt: i64 },
        Modify { pick: usize, backing: u8, collateral: i64, debt: i64 },
        Remove { pick: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..3, 0i64..1_000_000, 0i64..1_000_000).prop_map(|(backing, collateral, debt)| {
                Op::Create { backing, collateral, debt }
            }),
            (any::<usize>(), 0u8..3, 0i64..1_000_000, 0i64..1_000_000).prop_map(
                |(pick, backing, collateral, debt)| Op::Modify { pick, backing, collateral, debt }
            ),
            any::<usize>().prop_map(|pick| Op::Remove { pick }),
        ]
    }

    /// Sums recomputed directly from the live call orders.
    fn expected_totals(store: &InMemoryObjectStore) -> BTreeMap<AssetId, (i64, i64)> {
        let mut totals = BTreeMap::new();
        for obj in store.scan(ProtocolType::CallOrder.key()) {
            let order = obj.as_call_order().unwrap();
            let entry = totals.entry(order.backing_asset()).or_insert((0, 0));
            entry.0 += order.collateral.value();
            entry.1 += order.debt.value();
        }
        totals
    }

    proptest! {
        #[test]
        fn totals_match_live_orders(ops in proptest::collection::vec(op(), 1..60)) {
            let mut db = open();
            let key = ProtocolType::CallOrder.key();
            let mut live: Vec<ObjectId> = Vec::new();

            for op in ops {
                match op {
                    Op::Create { backing, collateral, debt } => {
                        let backing = AssetId::new(backing.into());
                        let id = db.create(key, |id| call_order(id, backing, collateral, debt)).unwrap();
                        live.push(id);
                    }
                    Op::Modify { pick, backing, collateral, debt } if !live.is_empty() => {
                        let id = live[pick % live.len()];
                        db.modify(&id, |obj| {
                            let order = obj.as_call_order_mut().unwrap();
                            order.collateral_type = AssetId::new(backing.into());
                            order.collateral = ShareAmount::new(collateral);
                            order.debt = ShareAmount::new(debt);
                        }).unwrap();
                    }
                    Op::Remove { pick } if !live.is_empty() => {
                        let id = live.remove(pick % live.len());
                        db.remove(&id).unwrap();
                    }
                    _ => {}
                }

                let expected = expected_totals(db.store());
                for asset in (0u64..3).map(AssetId::new) {
                    let (coll, debt) = expected.get(&asset).copied().unwrap_or((0, 0));
                    prop_assert_eq!(collateral(&db, asset), coll);
                    prop_assert_eq!(db.registrar().get_backing_collateral(asset).unwrap().value(), debt);
                }
            }
        }

        #[test]
        fn next_id_never_decreases(removals in proptest::collection::vec(any::<bool>(), 1..40)) {
            let mut db = open();
            let key = ProtocolType::LimitOrder.key();
            let mut last = 0u64;

            for remove in removals {
                let id = db.create(key, |id| Object::from(GenericObject { id })).unwrap();
                if remove {
                    db.remove(&id).unwrap();
                }
                db.apply_block(|_| Ok(())).unwrap();

                let next = db.registrar().get_next_id(key.space, key.type_id).unwrap().instance();
                prop_assert!(next >= last);
                prop_assert_eq!(next, id.instance() + 1);
                last = next;
            }
        }
    }
}
