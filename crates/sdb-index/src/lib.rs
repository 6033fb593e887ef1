//! Secondary indexes for the state database.
//!
//! Maintains derived, queryable state over the object store as objects are
//! inserted, modified and removed during block processing. Index state is
//! deterministic: every node applying the same mutations derives the same
//! values, since some of them feed consensus decisions.
//!
//! # Key Types
//!
//! - [`AmountInCollateralIndex`] -- Collateral and debt totals per backing asset
//! - [`NextObjectIdsIndex`] -- Next unused instance per `(space, type)` bucket
//! - [`IndexRegistrar`] -- Attaches the indexes and seeds them from a store scan
//! - [`IndexedDatabase`] -- Context owning the store and the registrar
//! - [`IndexesConfig`] -- Which indexes run and how they refresh

pub mod collateral;
pub mod config;
pub mod context;
pub mod error;
pub mod next_ids;
pub mod registrar;

pub use collateral::AmountInCollateralIndex;
pub use config::IndexesConfig;
pub use context::IndexedDatabase;
pub use error::{IndexError, IndexResult};
pub use next_ids::NextObjectIdsIndex;
pub use registrar::IndexRegistrar;
