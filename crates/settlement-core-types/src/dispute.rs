use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::Actor;
use crate::ids::OrderId;
use crate::order::OrderStatus;

/// Status of the two-party confirmation sub-machine.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    PendingConfirmation,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::PendingConfirmation => "pending_confirmation",
            DisputeStatus::Resolved => "resolved",
        }
    }
}

/// How escrowed funds are split once both parties confirm. Basis points so partial splits don't need floats.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    UserWins,
    MerchantWins,
    Split { user_bps: u16, merchant_bps: u16 },
}

impl Resolution {
    /// Basis points must sum to 10_000; `Split` is the only variant where
    /// that isn't trivially true.
    pub fn is_valid(&self) -> bool {
        match self {
            Resolution::UserWins | Resolution::MerchantWins => true,
            Resolution::Split { user_bps, merchant_bps } => {
                *user_bps as u32 + *merchant_bps as u32 == 10_000
            }
        }
    }

    pub fn user_bps(&self) -> u16 {
        match self {
            Resolution::UserWins => 10_000,
            Resolution::MerchantWins => 0,
            Resolution::Split { user_bps, .. } => *user_bps,
        }
    }

    pub fn merchant_bps(&self) -> u16 {
        10_000 - self.user_bps()
    }

    /// The order status a confirmed resolution finalizes into: a user win
    /// reverts the order to `cancelled`, a merchant win or split settles it
    /// as `completed`.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            Resolution::UserWins => OrderStatus::Cancelled,
            Resolution::MerchantWins | Resolution::Split { .. } => OrderStatus::Completed,
        }
    }
}

/// A dispute opened against an order. Resolution requires both parties to
/// confirm the same proposed split before the order can leave `disputed`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Dispute {
    pub id: Uuid,
    pub order_id: OrderId,
    pub status: DisputeStatus,
    pub opened_by: Actor,
    pub reason: String,
    pub proposed_resolution: Option<Resolution>,
    pub user_confirmed: bool,
    pub merchant_confirmed: bool,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    /// Both parties have confirmed the same proposal — ready to resolve.
    pub fn ready_to_resolve(&self) -> bool {
        self.status == DisputeStatus::PendingConfirmation
            && self.user_confirmed
            && self.merchant_confirmed
            && self.proposed_resolution.is_some()
    }
}
