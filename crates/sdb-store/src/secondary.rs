use std::sync::{Arc, RwLock};

use crate::error::StoreResult;
use crate::object::Object;

/// A derived structure kept consistent with one object collection.
///
/// The store invokes these callbacks synchronously from the thread applying
/// the mutation, in mutation order. Callbacks an index does not care about
/// keep their default no-op body.
///
/// Index state is not part of the store's history. An index either observes
/// every event from the moment it is attached, or it is seeded by a full scan
/// of the collection before its results are relied upon.
///
/// An error returned from a callback does not roll back the mutation that
/// triggered it. The store reports it as
/// [`StoreError::SecondaryIndex`](crate::StoreError::SecondaryIndex) and the
/// caller must treat the enclosing block step as failed.
pub trait SecondaryIndex: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Called right after `obj` has been added to its collection.
    fn object_inserted(&mut self, _obj: &Object) -> StoreResult<()> {
        Ok(())
    }

    /// Called right before `obj` is erased; `obj` is still stored.
    fn object_removed(&mut self, _obj: &Object) -> StoreResult<()> {
        Ok(())
    }

    /// Called right before an in-place modification, with the old state.
    fn about_to_modify(&mut self, _before: &Object) -> StoreResult<()> {
        Ok(())
    }

    /// Called right after an in-place modification, with the new state.
    fn object_modified(&mut self, _after: &Object) -> StoreResult<()> {
        Ok(())
    }
}

/// Shared handle through which the store dispatches to an attached index.
pub type SharedIndex = Arc<RwLock<dyn SecondaryIndex>>;
