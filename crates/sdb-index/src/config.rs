use serde::{Deserialize, Serialize};

use sdb_types::ReservedSpace;

use crate::error::{IndexError, IndexResult};

/// Configuration for the helper indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexesConfig {
    /// Track collateral and debt totals per backing asset.
    pub amount_in_collateral: bool,
    /// Track the next object id of every bucket.
    pub next_object_ids: bool,
    /// Re-seed the next-id index from the store after every applied block.
    pub refresh_next_ids_on_block: bool,
    /// Spaces whose buckets the next-id index covers.
    pub tracked_spaces: Vec<u8>,
}

impl Default for IndexesConfig {
    fn default() -> Self {
        Self {
            amount_in_collateral: true,
            next_object_ids: true,
            refresh_next_ids_on_block: true,
            tracked_spaces: vec![ReservedSpace::Protocol.id(), ReservedSpace::Implementation.id()],
        }
    }
}

impl IndexesConfig {
    /// A configuration with every index turned off.
    pub fn disabled() -> Self {
        Self {
            amount_in_collateral: false,
            next_object_ids: false,
            refresh_next_ids_on_block: false,
            ..Default::default()
        }
    }

    /// Parse a TOML fragment. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> IndexResult<Self> {
        toml::from_str(s).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Returns `true` if buckets in `space` are covered by the next-id index.
    pub fn tracks_space(&self, space: u8) -> bool {
        self.tracked_spaces.contains(&space)
    }
}
