//! Foundation types for the state database.
//!
//! Every stored object is addressed by an [`ObjectId`] made of a reserved
//! space, a type within that space and a per-bucket instance number. Every
//! other `sdb` crate depends on `sdb-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Composite `(space, type, instance)` object identifier
//! - [`CollectionKey`] — The `(space, type)` bucket an object lives in
//! - [`ReservedSpace`] — Protocol vs. implementation object spaces
//! - [`ProtocolType`] / [`ImplementationType`] — Object kinds per space
//! - [`AssetId`] — Typed reference to an asset object (`1.3.x`)
//! - [`ShareAmount`] — Checked signed share count

pub mod amount;
pub mod error;
pub mod object;
pub mod space;

pub use amount::{AssetId, ShareAmount};
pub use error::TypeError;
pub use object::{CollectionKey, ObjectId};
pub use space::{ImplementationType, ProtocolType, ReservedSpace};
