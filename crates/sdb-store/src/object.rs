//! Object schemas held by the store.
//!
//! Only the fields the indexes read are modelled. Buckets without a
//! dedicated schema hold [`GenericObject`]s.

use serde::{Deserialize, Serialize};

use sdb_types::{AssetId, CollectionKey, ObjectId, ProtocolType, ShareAmount};

/// A registered account (`1.2.x`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountObject {
    pub id: ObjectId,
    pub name: String,
}

/// An asset definition (`1.3.x`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub id: ObjectId,
    pub symbol: String,
}

/// A block producer (`1.6.x`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessObject {
    pub id: ObjectId,
    pub witness_account: ObjectId,
}

/// A committee member (`1.5.x`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMemberObject {
    pub id: ObjectId,
    pub committee_member_account: ObjectId,
}

/// A margin position (`1.8.x`): debt borrowed against locked collateral.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOrderObject {
    pub id: ObjectId,
    pub borrower: ObjectId,
    /// Amount of `collateral_type` locked by this position.
    pub collateral: ShareAmount,
    /// Amount of `debt_type` borrowed.
    pub debt: ShareAmount,
    /// The backing asset.
    pub collateral_type: AssetId,
    pub debt_type: AssetId,
}

impl CallOrderObject {
    pub fn backing_asset(&self) -> AssetId {
        self.collateral_type
    }
}

/// Placeholder for buckets whose fields no index reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericObject {
    pub id: ObjectId,
}

/// Any object held by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    Account(AccountObject),
    Asset(AssetObject),
    Witness(WitnessObject),
    CommitteeMember(CommitteeMemberObject),
    CallOrder(CallOrderObject),
    Generic(GenericObject),
}

impl Object {
    pub fn id(&self) -> ObjectId {
        match self {
            Object::Account(o) => o.id,
            Object::Asset(o) => o.id,
            Object::Witness(o) => o.id,
            Object::CommitteeMember(o) => o.id,
            Object::CallOrder(o) => o.id,
            Object::Generic(o) => o.id,
        }
    }

    pub fn collection(&self) -> CollectionKey {
        self.id().collection()
    }

    pub fn as_call_order(&self) -> Option<&CallOrderObject> {
        match self {
            Object::CallOrder(order) => Some(order),
            _ => None,
        }
    }

    pub fn as_call_order_mut(&mut self) -> Option<&mut CallOrderObject> {
        match self {
            Object::CallOrder(order) => Some(order),
            _ => None,
        }
    }

    /// Short name of the schema, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Account(_) => ProtocolType::Account.label(),
            Object::Asset(_) => ProtocolType::Asset.label(),
            Object::Witness(_) => ProtocolType::Witness.label(),
            Object::CommitteeMember(_) => ProtocolType::CommitteeMember.label(),
            Object::CallOrder(_) => ProtocolType::CallOrder.label(),
            Object::Generic(_) => "generic",
        }
    }
}

impl From<AccountObject> for Object {
    fn from(o: AccountObject) -> Self {
        Object::Account(o)
    }
}

impl From<AssetObject> for Object {
    fn from(o: AssetObject) -> Self {
        Object::Asset(o)
    }
}

impl From<WitnessObject> for Object {
    fn from(o: WitnessObject) -> Self {
        Object::Witness(o)
    }
}

impl From<CommitteeMemberObject> for Object {
    fn from(o: CommitteeMemberObject) -> Self {
        Object::CommitteeMember(o)
    }
}

impl From<CallOrderObject> for Object {
    fn from(o: CallOrderObject) -> Self {
        Object::CallOrder(o)
    }
}

impl From<GenericObject> for Object {
    fn from(o: GenericObject) -> Self {
        Object::Generic(o)
    }
}
