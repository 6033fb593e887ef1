use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The `(space, type)` bucket that groups objects of one kind.
///
/// Each bucket owns its own instance sequence. Ordering is lexicographic on
/// `(space, type_id)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionKey {
    pub space: u8,
    pub type_id: u8,
}

impl CollectionKey {
    pub const fn new(space: u8, type_id: u8) -> Self {
        Self { space, type_id }
    }

    /// The id of the object with the given instance in this bucket.
    pub const fn object(self, instance: u64) -> ObjectId {
        ObjectId::new(self.space, self.type_id, instance)
    }
}

impl fmt::Debug for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionKey({}.{})", self.space, self.type_id)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.space, self.type_id)
    }
}

impl From<(u8, u8)> for CollectionKey {
    fn from((space, type_id): (u8, u8)) -> Self {
        Self::new(space, type_id)
    }
}

/// Identifier for any stored object.
///
/// An `ObjectId` is the triple `(space, type, instance)`. The instance is
/// assigned monotonically per `(space, type)` bucket and is never reused,
/// even after the object is erased. Ids order lexicographically on the
/// triple, and render as `space.type.instance` (for example `1.8.42`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    space: u8,
    type_id: u8,
    instance: u64,
}

impl ObjectId {
    pub const fn new(space: u8, type_id: u8, instance: u64) -> Self {
        Self {
            space,
            type_id,
            instance,
        }
    }

    pub const fn space(&self) -> u8 {
        self.space
    }

    pub const fn type_id(&self) -> u8 {
        self.type_id
    }

    pub const fn instance(&self) -> u64 {
        self.instance
    }

    /// The bucket this object belongs to.
    pub const fn collection(&self) -> CollectionKey {
        CollectionKey::new(self.space, self.type_id)
    }

    /// Returns `true` if this id lives in the given bucket.
    pub fn is_in(&self, key: CollectionKey) -> bool {
        self.collection() == key
    }

    /// Returns `true` for ids in the relative protocol space (`0.x.x`).
    pub fn is_relative(&self) -> bool {
        self.space == 0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.space, self.type_id, self.instance)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidObjectId(s.to_string());
        let mut parts = s.split('.');
        let (Some(space), Some(type_id), Some(instance), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Ok(Self::new(
            space.parse().map_err(|_| invalid())?,
            type_id.parse().map_err(|_| invalid())?,
            instance.parse().map_err(|_| invalid())?,
        ))
    }
}
