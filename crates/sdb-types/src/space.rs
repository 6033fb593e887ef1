//! Reserved object spaces and the object kinds registered in each.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::CollectionKey;

/// Top-level partition of the object id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReservedSpace {
    /// Ids relative to the operation that creates them (`0.x.x`).
    RelativeProtocol = 0,
    /// Objects created by protocol operations (`1.x.x`).
    Protocol = 1,
    /// Objects maintained by the node implementation (`2.x.x`).
    Implementation = 2,
}

impl ReservedSpace {
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ReservedSpace {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RelativeProtocol),
            1 => Ok(Self::Protocol),
            2 => Ok(Self::Implementation),
            other => Err(TypeError::InvalidObjectId(format!("reserved space {other}"))),
        }
    }
}

macro_rules! object_types {
    (
        $(#[$meta:meta])*
        $name:ident in $space:expr => { $($variant:ident = $value:literal => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            /// Every kind in this space, ascending by type id.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn id(self) -> u8 {
                self as u8
            }

            /// The bucket holding objects of this kind.
            pub const fn key(self) -> CollectionKey {
                CollectionKey::new($space.id(), self as u8)
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = TypeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    type_id => Err(TypeError::UnknownType {
                        space: $space.id(),
                        type_id,
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

object_types! {
    /// Object kinds in the protocol space (`1.x.x`).
    ProtocolType in ReservedSpace::Protocol => {
        Null = 0 => "null",
        Base = 1 => "base",
        Account = 2 => "account",
        Asset = 3 => "asset",
        ForceSettlement = 4 => "force_settlement",
        CommitteeMember = 5 => "committee_member",
        Witness = 6 => "witness",
        LimitOrder = 7 => "limit_order",
        CallOrder = 8 => "call_order",
        Custom = 9 => "custom",
        Proposal = 10 => "proposal",
        OperationHistory = 11 => "operation_history",
        WithdrawPermission = 12 => "withdraw_permission",
        VestingBalance = 13 => "vesting_balance",
        Worker = 14 => "worker",
        Balance = 15 => "balance",
        Htlc = 16 => "htlc",
    }
}

object_types! {
    /// Object kinds in the implementation space (`2.x.x`).
    ImplementationType in ReservedSpace::Implementation => {
        GlobalProperty = 0 => "global_property",
        DynamicGlobalProperty = 1 => "dynamic_global_property",
        AssetDynamicData = 3 => "asset_dynamic_data",
        AssetBitassetData = 4 => "asset_bitasset_data",
        AccountBalance = 5 => "account_balance",
        AccountStatistics = 6 => "account_statistics",
    }
}
