use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{OrderError, Result};
use crate::ids::{OrderId, PartyKind, TxHash};

/// Full lifecycle status. `payment_pending` is part of the named state set
/// but is never produced by any transition today; it is kept as a valid
/// state because the minimal-status projection still maps it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    EscrowPending,
    Escrowed,
    PaymentPending,
    PaymentSent,
    PaymentConfirmed,
    Releasing,
    Completed,
    Cancelled,
    Disputed,
    Expired,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::EscrowPending,
        OrderStatus::Escrowed,
        OrderStatus::PaymentPending,
        OrderStatus::PaymentSent,
        OrderStatus::PaymentConfirmed,
        OrderStatus::Releasing,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Disputed,
        OrderStatus::Expired,
    ];

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::EscrowPending => "escrow_pending",
            OrderStatus::Escrowed => "escrowed",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::PaymentSent => "payment_sent",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::Releasing => "releasing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
            OrderStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => OrderStatus::Pending,
            "accepted" => OrderStatus::Accepted,
            "escrow_pending" => OrderStatus::EscrowPending,
            "escrowed" => OrderStatus::Escrowed,
            "payment_pending" => OrderStatus::PaymentPending,
            "payment_sent" => OrderStatus::PaymentSent,
            "payment_confirmed" => OrderStatus::PaymentConfirmed,
            "releasing" => OrderStatus::Releasing,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "disputed" => OrderStatus::Disputed,
            "expired" => OrderStatus::Expired,
            other => return Err(OrderError::Validation(format!("unknown order status: {other}"))),
        })
    }
}

/// Coarse projection exposed to external consumers — collapses internal escrow/settlement
/// micro-states a client does not need to distinguish.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum MinimalStatus {
    Open,
    Accepted,
    Escrowed,
    PaymentSent,
    Completed,
    Cancelled,
    Disputed,
    Expired,
}

impl fmt::Display for MinimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MinimalStatus::Open => "open",
            MinimalStatus::Accepted => "accepted",
            MinimalStatus::Escrowed => "escrowed",
            MinimalStatus::PaymentSent => "payment_sent",
            MinimalStatus::Completed => "completed",
            MinimalStatus::Cancelled => "cancelled",
            MinimalStatus::Disputed => "disputed",
            MinimalStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl From<OrderStatus> for MinimalStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => MinimalStatus::Open,
            OrderStatus::Accepted | OrderStatus::EscrowPending => MinimalStatus::Accepted,
            OrderStatus::Escrowed | OrderStatus::PaymentPending => MinimalStatus::Escrowed,
            OrderStatus::PaymentSent | OrderStatus::PaymentConfirmed => MinimalStatus::PaymentSent,
            OrderStatus::Releasing | OrderStatus::Completed => MinimalStatus::Completed,
            OrderStatus::Cancelled => MinimalStatus::Cancelled,
            OrderStatus::Disputed => MinimalStatus::Disputed,
            OrderStatus::Expired => MinimalStatus::Expired,
        }
    }
}

/// Which side of the crypto<->fiat trade the order's creator is on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Buy => write!(f, "buy"),
            OrderType::Sell => write!(f, "sell"),
        }
    }
}

/// Settlement rail the fiat leg moves over.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bank,
    Cash,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Bank => write!(f, "bank"),
            PaymentMethod::Cash => write!(f, "cash"),
        }
    }
}

/// Method-specific settlement instructions captured at order creation.
/// Modeled as a tagged enum rather than an opaque JSON blob so the state
/// machine and ledger never have to guess the shape of what they're handed.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentDetails {
    Bank {
        bank_name: String,
        account_holder: String,
        account_number: String,
        routing_code: Option<String>,
    },
    Cash {
        meeting_location: String,
        instructions: Option<String>,
    },
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Bank { .. } => PaymentMethod::Bank,
            PaymentDetails::Cash { .. } => PaymentMethod::Cash,
        }
    }
}

/// Fee-tier preference a user picks between at order creation; maps to a fixed platform fee percentage applied
/// at escrow release.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum SpreadPreference {
    Cheap,
    Best,
    Fastest,
}

impl SpreadPreference {
    /// Platform fee percentage charged against the settlement amount.
    pub fn fee_percent(&self) -> Decimal {
        match self {
            SpreadPreference::Cheap => Decimal::new(150, 2),
            SpreadPreference::Best => Decimal::new(200, 2),
            SpreadPreference::Fastest => Decimal::new(250, 2),
        }
    }
}

impl fmt::Display for SpreadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpreadPreference::Cheap => write!(f, "cheap"),
            SpreadPreference::Best => write!(f, "best"),
            SpreadPreference::Fastest => write!(f, "fastest"),
        }
    }
}

/// The order record itself. `order_version` is the
/// optimistic-concurrency counter bumped by every `apply_transition` call;
/// callers that pass a stale `expected_version` get `VersionConflict`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub order_version: i64,

    pub offer_id: Uuid,
    pub user_id: Uuid,
    pub merchant_id: Option<Uuid>,
    /// Counterparty merchant on the other side of an M2M trade, when present.
    /// Overrides the usual buy/sell payer derivation per `escrow_owner`.
    pub buyer_merchant_id: Option<Uuid>,

    pub crypto_asset: String,
    pub crypto_amount: Decimal,
    pub fiat_currency: String,
    pub fiat_amount: Decimal,
    /// Crypto/fiat exchange rate locked in at order creation.
    pub rate: Decimal,

    pub spread_preference: SpreadPreference,
    pub payment_details: PaymentDetails,

    /// Platform fee percentage, snapshotted from `spread_preference.fee_percent()`
    /// at creation so a later change to the fee table can't retroactively
    /// change an in-flight order's economics.
    pub protocol_fee_percentage: Decimal,
    pub protocol_fee_amount: Decimal,

    pub escrow_tx_hash: Option<TxHash>,
    pub release_tx_hash: Option<TxHash>,
    pub refund_tx_hash: Option<TxHash>,

    /// Which party's balance `lock_escrow` actually debited, and how much.
    /// Recorded once at lock time so a later reassignment of `merchant_id`
    /// (or a change to `order_type`) can never change who a refund pays.
    pub escrow_debited_kind: Option<PartyKind>,
    pub escrow_debited_id: Option<Uuid>,
    pub escrow_debited_amount: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    pub accepted_at: Option<DateTime<Utc>>,
    pub escrowed_at: Option<DateTime<Utc>>,
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn minimal_status(&self) -> MinimalStatus {
        self.status.into()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now >= self.expires_at
    }

    /// Stamps the lifecycle timestamp matching `status`, leaving timestamps
    /// for statuses other than the five tracked ones untouched.
    pub fn stamp_status_timestamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        match status {
            OrderStatus::Accepted => self.accepted_at = Some(at),
            OrderStatus::Escrowed => self.escrowed_at = Some(at),
            OrderStatus::PaymentSent => self.payment_sent_at = Some(at),
            OrderStatus::PaymentConfirmed => self.payment_confirmed_at = Some(at),
            OrderStatus::Completed => self.completed_at = Some(at),
            OrderStatus::Cancelled => self.cancelled_at = Some(at),
            _ => {}
        }
    }
}
