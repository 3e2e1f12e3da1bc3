//! The single primitive every lifecycle operation in `settlement-core-api`
//! goes through: lock the order row, check
//! the requested move against the pure state machine, let the caller stage
//! whatever ledger/dispute side effects the move implies, then persist the
//! new status, the audit event, and the outbox row — all inside one
//! transaction. Nothing about a given operation (escrow lock, payment
//! confirmation, dispute resolution) is special-cased here; this is only
//! the envelope they share.

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use sqlx::PgPool;

use settlement_core_types::{Actor, ActorRole, Order, OrderError, OrderId, OrderStatus, Result};
use settlement_core_statemachine::check_transition_as;

use crate::{events, orders, outbox};

/// Side effects a specific operation needs to run against the same
/// transaction as the status change, with the chance to mutate fields on
/// `order` (tx hashes, etc.) before it is persisted.
pub type Effects<'a> = Box<dyn for<'c> FnOnce(&'c mut sqlx::PgConnection, &'c mut Order) -> BoxFuture<'c, Result<()>> + Send + 'a>;

pub struct TransitionRequest<'a> {
    pub order_id: OrderId,
    pub actor: Actor,
    pub to: OrderStatus,
    pub expected_version: Option<i64>,
    pub metadata: Value,
    pub effects: Effects<'a>,
    /// Overrides the role `check_transition_as` authorizes against, letting
    /// the caller be judged as the canonical payer/receiver for an order
    /// rather than its literal `actor.role()` (see
    /// `settlement_core_statemachine::{payer_role, receiver_role}`). Takes
    /// the freshly row-locked `order` so the remap can read `order_type`.
    /// `None` authorizes against `actor.role()` directly, same as plain
    /// `check_transition`.
    pub role_override: Option<fn(&Order, &Actor) -> ActorRole>,
}

pub async fn apply_transition(pool: &PgPool, req: TransitionRequest<'_>) -> Result<Order> {
    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;

    let mut order = orders::get_for_update(&mut tx, req.order_id)
        .await?
        .ok_or(OrderError::OrderNotFound)?;

    if let Some(expected) = req.expected_version {
        if order.order_version != expected {
            return Err(OrderError::VersionConflict {
                expected,
                actual: order.order_version,
            });
        }
    }

    let role = req
        .role_override
        .map(|f| f(&order, &req.actor))
        .unwrap_or_else(|| req.actor.role());
    check_transition_as(role, &req.actor, order.status, req.to)?;

    let from = order.status;
    let original_version = order.order_version;

    (req.effects)(&mut tx, &mut order).await?;

    order.status = req.to;
    order.order_version = original_version + 1;
    order.updated_at = Utc::now();
    order.stamp_status_timestamp(req.to, order.updated_at);

    orders::update_after_transition(&mut tx, &order, original_version).await?;

    events::record(
        &mut tx,
        req.order_id,
        Some(from),
        req.to,
        &req.actor,
        order.order_version,
        req.metadata,
    )
    .await?;

    outbox::stage(
        &mut tx,
        req.order_id,
        &format!("order.{}", req.to.as_str()),
        json!({
            "order_id": req.order_id.to_string(),
            "from_status": from.as_str(),
            "to_status": req.to.as_str(),
            "order_version": order.order_version,
        }),
    )
    .await?;

    tx.commit().await.map_err(|e| OrderError::Database(e.to_string()))?;

    Ok(order)
}

/// A transition with no side effects beyond the status/event/outbox
/// bookkeeping `apply_transition` always does — cancellation with no
/// escrow to refund, accepting an order, and similar plain moves.
pub fn no_effects<'a>() -> Effects<'a> {
    Box::new(|_conn, _order| Box::pin(async { Ok(()) }))
}
