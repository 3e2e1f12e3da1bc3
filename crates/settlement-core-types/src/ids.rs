use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque order identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

/// A party in the system: an end user or a merchant. Balances and escrow
/// provenance are always keyed on `(PartyKind, Uuid)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    User,
    Merchant,
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyKind::User => write!(f, "user"),
            PartyKind::Merchant => write!(f, "merchant"),
        }
    }
}

/// A resolved party reference: which ledger account this is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct PartyRef {
    pub kind: PartyKind,
    pub id: Uuid,
}

impl PartyRef {
    pub fn user(id: Uuid) -> Self {
        Self { kind: PartyKind::User, id }
    }

    pub fn merchant(id: Uuid) -> Self {
        Self { kind: PartyKind::Merchant, id }
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Opaque mock transaction hash, standing in for a real on-chain bridge.
/// Generated from order id + purpose + a random nonce, not a real digest of
/// any on-chain payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn mock(order_id: OrderId, purpose: &str) -> Self {
        let nonce: u64 = rand::random();
        let digest = blake3::hash(format!("{order_id}:{purpose}:{nonce}").as_bytes());
        Self(format!("mock_{}", hex::encode(&digest.as_bytes()[..16])))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.0)
    }
}
