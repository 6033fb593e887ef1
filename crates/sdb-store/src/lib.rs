//! Object storage for the state database.
//!
//! Blockchain objects (accounts, assets, witnesses, committee members, call
//! orders) live in typed collections, one per `(space, type)` bucket. Each
//! bucket assigns instance numbers monotonically and never reuses them.
//!
//! Secondary indexes attach to a bucket and observe every lifecycle event
//! of the objects in it through the [`SecondaryIndex`] callbacks.
//!
//! # Storage Backends
//!
//! All backends implement the read-side [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store with index dispatch
//!
//! # Design Rules
//!
//! 1. Callbacks run synchronously, in mutation order, never deferred.
//! 2. `object_removed` fires while the object is still readable.
//! 3. Every `object_modified` is preceded by exactly one `about_to_modify`.
//! 4. Index state is not part of store history; indexes seed by scanning.
//! 5. Iteration order is deterministic (ordered maps only).

pub mod error;
pub mod memory;
pub mod object;
pub mod secondary;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{
    AccountObject, AssetObject, CallOrderObject, CommitteeMemberObject, GenericObject, Object,
    WitnessObject,
};
pub use secondary::{SecondaryIndex, SharedIndex};
pub use traits::ObjectStore;
