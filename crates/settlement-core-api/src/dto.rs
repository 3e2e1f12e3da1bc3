use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use settlement_core_types::{
    MinimalStatus, Order, OrderStatus, OrderType, PaymentDetails, Resolution, SpreadPreference,
};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub offer_id: Uuid,
    pub merchant_id: Option<Uuid>,
    /// Present only for an M2M trade — the buyer-of-crypto merchant on the
    /// other side, overriding the usual buy/sell payer/recipient derivation.
    pub buyer_merchant_id: Option<Uuid>,
    pub crypto_asset: String,
    pub crypto_amount: Decimal,
    pub fiat_currency: String,
    pub fiat_amount: Decimal,
    pub rate: Decimal,
    pub spread_preference: SpreadPreference,
    pub payment_details: PaymentDetails,
    /// Minutes until the order expires if left untouched; defaults to the
    /// node's configured `default_order_ttl` when omitted.
    pub ttl_minutes: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub minimal_status: MinimalStatus,
    pub order_version: i64,
    pub offer_id: Uuid,
    pub user_id: Uuid,
    pub merchant_id: Option<Uuid>,
    pub buyer_merchant_id: Option<Uuid>,
    pub crypto_asset: String,
    pub crypto_amount: Decimal,
    pub fiat_currency: String,
    pub fiat_amount: Decimal,
    pub rate: Decimal,
    pub spread_preference: SpreadPreference,
    pub payment_details: PaymentDetails,
    pub protocol_fee_percentage: Decimal,
    pub protocol_fee_amount: Decimal,
    pub escrow_tx_hash: Option<String>,
    pub release_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,
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

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number,
            order_type: order.order_type,
            status: order.status,
            minimal_status: order.minimal_status(),
            order_version: order.order_version,
            offer_id: order.offer_id,
            user_id: order.user_id,
            merchant_id: order.merchant_id,
            buyer_merchant_id: order.buyer_merchant_id,
            crypto_asset: order.crypto_asset,
            crypto_amount: order.crypto_amount,
            fiat_currency: order.fiat_currency,
            fiat_amount: order.fiat_amount,
            rate: order.rate,
            spread_preference: order.spread_preference,
            payment_details: order.payment_details,
            protocol_fee_percentage: order.protocol_fee_percentage,
            protocol_fee_amount: order.protocol_fee_amount,
            escrow_tx_hash: order.escrow_tx_hash.map(|h| h.to_string()),
            release_tx_hash: order.release_tx_hash.map(|h| h.to_string()),
            refund_tx_hash: order.refund_tx_hash.map(|h| h.to_string()),
            created_at: order.created_at,
            updated_at: order.updated_at,
            expires_at: order.expires_at,
            accepted_at: order.accepted_at,
            escrowed_at: order.escrowed_at,
            payment_sent_at: order.payment_sent_at,
            payment_confirmed_at: order.payment_confirmed_at,
            completed_at: order.completed_at,
            cancelled_at: order.cancelled_at,
        }
    }
}

#[derive(Deserialize)]
pub struct AcceptOrderRequest {
    pub merchant_id: Uuid,
    pub expected_version: Option<i64>,
}

#[derive(Deserialize)]
pub struct VersionedRequest {
    pub expected_version: Option<i64>,
}

#[derive(Deserialize)]
pub struct OpenDisputeRequest {
    pub reason: String,
    pub expected_version: Option<i64>,
}

#[derive(Deserialize)]
pub struct ProposeResolutionRequest {
    pub resolution: Resolution,
}

#[derive(Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmAction {
    Accept,
    Reject,
}

#[derive(Deserialize)]
pub struct ConfirmResolutionRequest {
    pub action: ConfirmAction,
}

#[derive(Deserialize, Default)]
pub struct ListOrdersQuery {
    pub user_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}
