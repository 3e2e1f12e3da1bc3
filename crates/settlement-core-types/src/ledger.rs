use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{OrderId, PartyRef};

/// What kind of ledger movement an entry represents.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    EscrowLock,
    EscrowRelease,
    Refund,
    Fee,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::EscrowLock => "escrow_lock",
            EntryKind::EscrowRelease => "escrow_release",
            EntryKind::Refund => "refund",
            EntryKind::Fee => "fee",
        }
    }
}

/// One row of the append-only ledger. Every balance-affecting
/// operation writes exactly one of these per account touched, inside the
/// same transaction as the balance update itself.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub order_id: OrderId,
    pub party: PartyRef,
    pub kind: EntryKind,
    /// Signed: negative for debits, positive for credits.
    pub amount: Decimal,
    pub currency: String,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}
