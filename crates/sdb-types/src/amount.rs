use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;
use crate::space::ProtocolType;

/// Typed reference to an asset object (`1.3.x`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(u64);

impl AssetId {
    /// The core asset of the chain (`1.3.0`).
    pub const CORE: AssetId = AssetId(0);

    pub const fn new(instance: u64) -> Self {
        Self(instance)
    }

    pub const fn instance(&self) -> u64 {
        self.0
    }

    pub const fn object_id(&self) -> ObjectId {
        ProtocolType::Asset.key().object(self.0)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.object_id())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.object_id(), f)
    }
}

impl From<AssetId> for ObjectId {
    fn from(asset: AssetId) -> Self {
        asset.object_id()
    }
}

impl TryFrom<ObjectId> for AssetId {
    type Error = TypeError;

    fn try_from(id: ObjectId) -> Result<Self, Self::Error> {
        if !id.is_in(ProtocolType::Asset.key()) {
            return Err(TypeError::WrongObjectType {
                expected: ProtocolType::Asset.key().to_string(),
                actual: id.to_string(),
            });
        }
        Ok(Self(id.instance()))
    }
}

/// A signed count of asset shares.
///
/// Amounts are whole shares, never fractional. Arithmetic is checked: an
/// overflow yields `None` and is never wrapped or saturated, since every node
/// must derive the same value.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ShareAmount(i64);

impl ShareAmount {
    pub const ZERO: ShareAmount = ShareAmount(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: ShareAmount) -> Option<ShareAmount> {
        self.0.checked_add(rhs.0).map(ShareAmount)
    }

    pub fn checked_sub(self, rhs: ShareAmount) -> Option<ShareAmount> {
        self.0.checked_sub(rhs.0).map(ShareAmount)
    }
}

impl From<i64> for ShareAmount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ShareAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
