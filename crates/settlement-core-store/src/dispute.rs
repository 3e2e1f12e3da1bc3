//! Two-party confirmation dispute sub-machine. A dispute opens
//! the order into `disputed`; either side proposes a `Resolution`, and once
//! *both* sides have confirmed the same proposal the escrowed amount is
//! split accordingly and the order moves to a terminal state.

use chrono::Utc;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use settlement_core_types::{
    Actor, Dispute, DisputeStatus, EntryKind, OrderError, OrderId, OrderStatus, PartyRef,
    Resolution, Result,
};

use settlement_core_ledger::credit;

use crate::escrow::platform_account;
use crate::orders;
use crate::transitions::{apply_transition, Effects, TransitionRequest};

#[derive(sqlx::FromRow)]
struct DisputeRow {
    id: Uuid,
    order_id: Uuid,
    status: String,
    opened_by: serde_json::Value,
    reason: String,
    proposed_resolution: Option<serde_json::Value>,
    user_confirmed: bool,
    merchant_confirmed: bool,
    resolution: Option<serde_json::Value>,
    created_at: chrono::DateTime<Utc>,
    resolved_at: Option<chrono::DateTime<Utc>>,
}

fn parse_status(s: &str) -> Result<DisputeStatus> {
    Ok(match s {
        "open" => DisputeStatus::Open,
        "pending_confirmation" => DisputeStatus::PendingConfirmation,
        "resolved" => DisputeStatus::Resolved,
        other => return Err(OrderError::Internal(format!("unknown dispute status: {other}"))),
    })
}

impl TryFrom<DisputeRow> for Dispute {
    type Error = OrderError;

    fn try_from(row: DisputeRow) -> Result<Dispute> {
        Ok(Dispute {
            id: row.id,
            order_id: OrderId(row.order_id),
            status: parse_status(&row.status)?,
            opened_by: serde_json::from_value(row.opened_by)
                .map_err(|e| OrderError::Internal(format!("corrupt opened_by: {e}")))?,
            reason: row.reason,
            proposed_resolution: row
                .proposed_resolution
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| OrderError::Internal(format!("corrupt proposed_resolution: {e}")))?,
            user_confirmed: row.user_confirmed,
            merchant_confirmed: row.merchant_confirmed,
            resolution: row
                .resolution
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| OrderError::Internal(format!("corrupt resolution: {e}")))?,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, order_id, status, opened_by, reason, proposed_resolution, \
     user_confirmed, merchant_confirmed, resolution, created_at, resolved_at";

pub async fn get_by_order(conn: &mut PgConnection, order_id: OrderId) -> Result<Option<Dispute>> {
    let query = format!("SELECT {SELECT_COLUMNS} FROM disputes WHERE order_id = $1 FOR UPDATE");
    let row: Option<DisputeRow> = sqlx::query_as(&query)
        .bind(order_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    row.map(Dispute::try_from).transpose()
}

async fn insert(conn: &mut PgConnection, dispute: &Dispute) -> Result<()> {
    sqlx::query(
        "INSERT INTO disputes (id, order_id, status, opened_by, reason, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(dispute.id)
    .bind(dispute.order_id.0)
    .bind(dispute.status.as_str())
    .bind(serde_json::to_value(&dispute.opened_by).map_err(|e| OrderError::Internal(e.to_string()))?)
    .bind(&dispute.reason)
    .bind(dispute.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

/// `escrowed|payment_sent|payment_confirmed|releasing -> disputed`.
pub async fn open_dispute(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    reason: String,
    expected_version: Option<i64>,
) -> Result<Dispute> {
    let dispute = Dispute {
        id: Uuid::new_v4(),
        order_id,
        status: DisputeStatus::Open,
        opened_by: actor,
        reason: reason.clone(),
        proposed_resolution: None,
        user_confirmed: false,
        merchant_confirmed: false,
        resolution: None,
        created_at: Utc::now(),
        resolved_at: None,
    };

    let dispute_for_effects = dispute.clone();
    let effects: Effects = Box::new(move |conn, order| {
        Box::pin(async move {
            if get_by_order(conn, order.id).await?.is_some() {
                return Err(OrderError::DuplicateDispute);
            }
            insert(conn, &dispute_for_effects).await
        })
    });

    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor,
            to: OrderStatus::Disputed,
            expected_version,
            metadata: json!({ "action": "open_dispute", "reason": reason }),
            effects,
            role_override: None,
        },
    )
    .await?;

    Ok(dispute)
}

/// Either party proposes a split; proposing auto-confirms that party's own
/// side so a single additional confirmation from the other party resolves it.
pub async fn propose_resolution(
    pool: &PgPool,
    order_id: OrderId,
    actor: Actor,
    resolution: Resolution,
) -> Result<Dispute> {
    if !resolution.is_valid() {
        return Err(OrderError::Validation("split basis points must sum to 10000".into()));
    }

    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;
    let mut dispute = get_by_order(&mut tx, order_id).await?.ok_or(OrderError::DisputeNotFound)?;

    dispute.proposed_resolution = Some(resolution);
    dispute.status = DisputeStatus::PendingConfirmation;
    dispute.user_confirmed = matches!(actor, Actor::User { .. });
    dispute.merchant_confirmed = matches!(actor, Actor::Merchant { .. });

    sqlx::query(
        "UPDATE disputes SET proposed_resolution = $1, status = $2, user_confirmed = $3, merchant_confirmed = $4
         WHERE id = $5",
    )
    .bind(serde_json::to_value(resolution).map_err(|e| OrderError::Internal(e.to_string()))?)
    .bind(dispute.status.as_str())
    .bind(dispute.user_confirmed)
    .bind(dispute.merchant_confirmed)
    .bind(dispute.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    tx.commit().await.map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(dispute)
}

/// The counterparty confirms the standing proposal. Resolves and settles
/// the escrow split in the same call once both sides have confirmed.
pub async fn confirm_resolution(pool: &PgPool, order_id: OrderId, actor: Actor) -> Result<Dispute> {
    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;
    let mut dispute = get_by_order(&mut tx, order_id).await?.ok_or(OrderError::DisputeNotFound)?;

    if dispute.status != DisputeStatus::PendingConfirmation {
        return Err(OrderError::Validation("no proposed resolution awaiting confirmation".into()));
    }

    match actor {
        Actor::User { .. } => dispute.user_confirmed = true,
        Actor::Merchant { .. } => dispute.merchant_confirmed = true,
        Actor::System => {
            return Err(OrderError::Forbidden {
                actor: actor.to_string(),
                target: "dispute confirmation".into(),
            })
        }
    }

    sqlx::query("UPDATE disputes SET user_confirmed = $1, merchant_confirmed = $2 WHERE id = $3")
        .bind(dispute.user_confirmed)
        .bind(dispute.merchant_confirmed)
        .bind(dispute.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;

    let order = orders::get_for_update(&mut tx, order_id).await?.ok_or(OrderError::OrderNotFound)?;

    if dispute.ready_to_resolve() {
        let resolution = dispute.proposed_resolution.expect("ready_to_resolve implies Some");
        settle_split(&mut tx, &order, resolution).await?;

        dispute.status = DisputeStatus::Resolved;
        dispute.resolution = Some(resolution);
        dispute.resolved_at = Some(Utc::now());

        sqlx::query(
            "UPDATE disputes SET status = $1, resolution = $2, resolved_at = $3 WHERE id = $4",
        )
        .bind(dispute.status.as_str())
        .bind(serde_json::to_value(resolution).map_err(|e| OrderError::Internal(e.to_string()))?)
        .bind(dispute.resolved_at)
        .bind(dispute.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    }

    tx.commit().await.map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(dispute)
}

async fn settle_split(
    conn: &mut PgConnection,
    order: &settlement_core_types::Order,
    resolution: Resolution,
) -> Result<()> {
    use rust_decimal::Decimal;

    if order.escrow_tx_hash.is_none() {
        return Ok(());
    }

    let user_share = order.crypto_amount * Decimal::from(resolution.user_bps()) / Decimal::from(10_000u32);
    let merchant_share = order.crypto_amount - user_share;

    if user_share > Decimal::ZERO {
        credit(
            conn,
            order.id,
            PartyRef::user(order.user_id),
            &order.crypto_asset,
            user_share,
            EntryKind::EscrowRelease,
        )
        .await?;
    }
    if merchant_share > Decimal::ZERO {
        if let Some(merchant_id) = order.merchant_id {
            credit(
                conn,
                order.id,
                PartyRef::merchant(merchant_id),
                &order.crypto_asset,
                merchant_share,
                EntryKind::EscrowRelease,
            )
            .await?;
        } else {
            credit(conn, order.id, platform_account(), &order.crypto_asset, merchant_share, EntryKind::EscrowRelease)
                .await?;
        }
    }

    Ok(())
}

/// Moves the order out of `disputed` once its dispute row is `resolved`.
pub async fn finalize_disputed_order(
    pool: &PgPool,
    order_id: OrderId,
    to: OrderStatus,
    expected_version: Option<i64>,
) -> Result<settlement_core_types::Order> {
    apply_transition(
        pool,
        TransitionRequest {
            order_id,
            actor: Actor::System,
            to,
            expected_version,
            metadata: json!({ "action": "finalize_disputed_order" }),
            effects: crate::transitions::no_effects(),
            role_override: None,
        },
    )
    .await
}

/// A rejection by either party reverts the dispute to `open` with no order
/// status change — the proposal and both confirmation flags are cleared so
/// a fresh proposal can be made.
pub async fn reject_resolution(pool: &PgPool, order_id: OrderId) -> Result<Dispute> {
    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;
    let mut dispute = get_by_order(&mut tx, order_id).await?.ok_or(OrderError::DisputeNotFound)?;

    if dispute.status != DisputeStatus::PendingConfirmation {
        return Err(OrderError::Validation("no proposed resolution awaiting confirmation".into()));
    }

    dispute.status = DisputeStatus::Open;
    dispute.proposed_resolution = None;
    dispute.user_confirmed = false;
    dispute.merchant_confirmed = false;

    sqlx::query(
        "UPDATE disputes SET status = $1, proposed_resolution = NULL, user_confirmed = false, merchant_confirmed = false
         WHERE id = $2",
    )
    .bind(dispute.status.as_str())
    .bind(dispute.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    tx.commit().await.map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(dispute)
}
