//! The plain lifecycle moves that carry no ledger side effects: accepting
//! an order (which also assigns the merchant), marking payment sent, and
//! confirming payment. Escrow lock/release/refund live in `escrow`; dispute
//! moves live in `dispute`.

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use settlement_core_types::{Actor, Order, OrderId, OrderStatus, OrderError, Result};
use settlement_core_statemachine::{payer_role, receiver_role};

use crate::transitions::{apply_transition, no_effects, Effects, TransitionRequest};

/// `pending -> accepted`, assigning the accepting merchant onto the order.
pub async fn accept_order(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    merchant_id: Uuid,
    expected_version: Option<i64>,
) -> Result<Order> {
    let effects: Effects = Box::new(move |conn, order| {
        Box::pin(async move {
            sqlx::query("UPDATE orders SET merchant_id = $1 WHERE id = $2")
                .bind(merchant_id)
                .bind(order.id.0)
                .execute(&mut *conn)
                .await
                .map_err(|e| OrderError::Database(e.to_string()))?;
            order.merchant_id = Some(merchant_id);
            Ok(())
        })
    });

    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to: OrderStatus::Accepted,
            expected_version,
            metadata: json!({ "action": "accept_order", "merchant_id": merchant_id.to_string() }),
            effects,
            role_override: None,
        },
    )
    .await
}

/// `escrowed -> payment_sent`. The fiat payer varies by `order_type` (buy:
/// the user, sell: the merchant) — `payer_role` remaps the caller onto the
/// matrix's canonical payer slot before authorization runs.
pub async fn mark_payment_sent(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    expected_version: Option<i64>,
) -> Result<Order> {
    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to: OrderStatus::PaymentSent,
            expected_version,
            metadata: json!({ "action": "mark_payment_sent" }),
            effects: no_effects(),
            role_override: Some(|order, actor| payer_role(order.order_type, actor)),
        },
    )
    .await
}

/// `payment_sent -> payment_confirmed`. The fiat receiver is the other
/// party from `mark_payment_sent` — `receiver_role` performs the same
/// remap for the complementary role.
pub async fn confirm_payment(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    expected_version: Option<i64>,
) -> Result<Order> {
    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to: OrderStatus::PaymentConfirmed,
            expected_version,
            metadata: json!({ "action": "confirm_payment" }),
            effects: no_effects(),
            role_override: Some(|order, actor| receiver_role(order.order_type, actor)),
        },
    )
    .await
}
