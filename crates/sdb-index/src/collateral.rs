//! Collateral aggregation over live call orders.
//!
//! [`AmountInCollateralIndex`] observes the call-order bucket and keeps, for
//! every backing asset, the total collateral locked by live call orders and
//! the total debt those orders back. Both totals are maintained
//! incrementally from insert/remove/modify deltas and feed margin-call and
//! settlement decisions, so any inconsistency is reported as a fatal
//! [`IndexError::InvariantViolation`] rather than corrected.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use sdb_store::{CallOrderObject, Object, SecondaryIndex, StoreError, StoreResult};
use sdb_types::{AssetId, ObjectId, ShareAmount};

use crate::error::{IndexError, IndexResult};

const NAME: &str = "amount_in_collateral";

/// Pre-modification values of a call order, held until `object_modified`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CollateralSnapshot {
    collateral: ShareAmount,
    debt: ShareAmount,
    backing: AssetId,
}

impl From<&CallOrderObject> for CollateralSnapshot {
    fn from(order: &CallOrderObject) -> Self {
        Self {
            collateral: order.collateral,
            debt: order.debt,
            backing: order.backing_asset(),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Credit,
    Debit,
}

/// Tracks how much of each asset is locked up as collateral, and how much
/// debt that collateral backs in total.
///
/// Invariants, for every asset `a`:
/// - `in_collateral[a]` is the sum of `collateral` over live orders backed by `a`
/// - `backing_collateral[a]` is the sum of `debt` over live orders backed by `a`
///
/// Assets with no live orders have no entry and read as zero.
#[derive(Debug, Default)]
pub struct AmountInCollateralIndex {
    in_collateral: BTreeMap<AssetId, ShareAmount>,
    backing_collateral: BTreeMap<AssetId, ShareAmount>,
    live: BTreeSet<ObjectId>,
    pending: BTreeMap<ObjectId, CollateralSnapshot>,
}

impl AmountInCollateralIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total collateral locked in live call orders backed by `asset`.
    pub fn get_amount_in_collateral(&self, asset: AssetId) -> ShareAmount {
        self.in_collateral.get(&asset).copied().unwrap_or_default()
    }

    /// Total debt backed by live call orders collateralised in `asset`.
    pub fn get_backing_collateral(&self, asset: AssetId) -> ShareAmount {
        self.backing_collateral.get(&asset).copied().unwrap_or_default()
    }

    /// Number of call orders currently counted.
    pub fn live_orders(&self) -> usize {
        self.live.len()
    }

    /// Backing assets with a non-zero total, ascending.
    pub fn assets(&self) -> Vec<AssetId> {
        self.in_collateral
            .keys()
            .chain(self.backing_collateral.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Forget all state, ahead of re-seeding from a scan.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ---------------------------------------------------------------
    // Event handling
    // ---------------------------------------------------------------

    pub fn on_inserted(&mut self, order: &CallOrderObject) -> IndexResult<()> {
        if self.live.contains(&order.id) {
            return Err(violation(format!("call order {} inserted twice", order.id)));
        }
        self.apply(CollateralSnapshot::from(order), Direction::Credit)?;
        self.live.insert(order.id);
        debug!(
            id = %order.id,
            backing = %order.backing_asset(),
            collateral = %order.collateral,
            debt = %order.debt,
            "call order counted"
        );
        Ok(())
    }

    pub fn on_removed(&mut self, order: &CallOrderObject) -> IndexResult<()> {
        if !self.live.contains(&order.id) {
            return Err(violation(format!(
                "call order {} removed but never inserted",
                order.id
            )));
        }
        self.apply(CollateralSnapshot::from(order), Direction::Debit)?;
        self.live.remove(&order.id);
        self.pending.remove(&order.id);
        debug!(id = %order.id, backing = %order.backing_asset(), "call order uncounted");
        Ok(())
    }

    pub fn on_about_to_modify(&mut self, before: &CallOrderObject) -> IndexResult<()> {
        if !self.live.contains(&before.id) {
            return Err(violation(format!(
                "call order {} modified but never inserted",
                before.id
            )));
        }
        if self
            .pending
            .insert(before.id, CollateralSnapshot::from(before))
            .is_some()
        {
            return Err(violation(format!(
                "call order {} snapshotted twice without a modification",
                before.id
            )));
        }
        Ok(())
    }

    pub fn on_modified(&mut self, after: &CallOrderObject) -> IndexResult<()> {
        let before = self.pending.remove(&after.id).ok_or_else(|| {
            violation(format!(
                "call order {} modified without a prior snapshot",
                after.id
            ))
        })?;
        self.apply(before, Direction::Debit)?;
        self.apply(CollateralSnapshot::from(after), Direction::Credit)?;
        debug!(
            id = %after.id,
            from = %before.backing,
            to = %after.backing_asset(),
            "call order recounted"
        );
        Ok(())
    }

    /// Apply one order's contribution to both totals of its backing asset.
    ///
    /// Both new totals are computed before either is written, so a violation
    /// leaves the asset's totals untouched.
    fn apply(&mut self, values: CollateralSnapshot, direction: Direction) -> IndexResult<()> {
        let asset = values.backing;
        let in_collateral = adjust(
            self.get_amount_in_collateral(asset),
            values.collateral,
            direction,
            "collateral",
            asset,
        )?;
        let backing = adjust(
            self.get_backing_collateral(asset),
            values.debt,
            direction,
            "backing debt",
            asset,
        )?;
        store_total(&mut self.in_collateral, asset, in_collateral);
        store_total(&mut self.backing_collateral, asset, backing);
        Ok(())
    }
}

fn violation(reason: String) -> IndexError {
    IndexError::InvariantViolation {
        index: NAME,
        reason,
    }
}

fn adjust(
    total: ShareAmount,
    amount: ShareAmount,
    direction: Direction,
    what: &str,
    asset: AssetId,
) -> IndexResult<ShareAmount> {
    let updated = match direction {
        Direction::Credit => total.checked_add(amount),
        Direction::Debit => total.checked_sub(amount),
    }
    .ok_or_else(|| violation(format!("{what} total for {asset} overflowed")))?;
    if updated.is_negative() {
        return Err(violation(format!(
            "{what} total for {asset} would become {updated}"
        )));
    }
    Ok(updated)
}

fn store_total(map: &mut BTreeMap<AssetId, ShareAmount>, asset: AssetId, total: ShareAmount) {
    if total.is_zero() {
        map.remove(&asset);
    } else {
        map.insert(asset, total);
    }
}

fn call_order(obj: &Object) -> IndexResult<&CallOrderObject> {
    obj.as_call_order().ok_or(IndexError::UnexpectedObject {
        index: NAME,
        id: obj.id(),
        kind: obj.kind(),
    })
}

fn to_store(e: IndexError) -> StoreError {
    StoreError::secondary(NAME, e)
}

impl SecondaryIndex for AmountInCollateralIndex {
    fn name(&self) -> &'static str {
        NAME
    }

    fn object_inserted(&mut self, obj: &Object) -> StoreResult<()> {
        call_order(obj)
            .and_then(|order| self.on_inserted(order))
            .map_err(to_store)
    }

    fn object_removed(&mut self, obj: &Object) -> StoreResult<()> {
        call_order(obj)
            .and_then(|order| self.on_removed(order))
            .map_err(to_store)
    }

    fn about_to_modify(&mut self, before: &Object) -> StoreResult<()> {
        call_order(before)
            .and_then(|order| self.on_about_to_modify(order))
            .map_err(to_store)
    }

    fn object_modified(&mut self, after: &Object) -> StoreResult<()> {
        call_order(after)
            .and_then(|order| self.on_modified(order))
            .map_err(to_store)
    }
}
