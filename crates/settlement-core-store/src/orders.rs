//! `orders` table repository — plain parameterized SQL over a connection,
//! using the runtime `sqlx::query`/`query_as` builders rather than the
//! compile-time `sqlx::query!` macros, which would need a live database at
//! build time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use settlement_core_types::{
    Actor, Order, OrderError, OrderId, OrderStatus, OrderType, PartyKind, Result,
    SpreadPreference, TxHash,
};

use crate::{events, outbox};

/// Persist a brand-new order and its creation event/outbox row in one
/// transaction. Not routed through `apply_transition` — there is no prior
/// row to lock, and `pending` is always the first status.
pub async fn create(pool: &PgPool, order: &Order) -> Result<()> {
    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;

    insert(&mut tx, order).await?;
    events::record(
        &mut tx,
        order.id,
        None,
        order.status,
        &Actor::User { id: order.user_id },
        order.order_version,
        json!({ "action": "create_order" }),
    )
    .await?;
    outbox::stage(
        &mut tx,
        order.id,
        "order.created",
        json!({ "order_id": order.id.to_string(), "status": order.status.as_str() }),
    )
    .await?;

    tx.commit().await.map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    order_type: String,
    status: String,
    order_version: i64,
    offer_id: Uuid,
    user_id: Uuid,
    merchant_id: Option<Uuid>,
    buyer_merchant_id: Option<Uuid>,
    crypto_asset: String,
    crypto_amount: Decimal,
    fiat_currency: String,
    fiat_amount: Decimal,
    rate: Decimal,
    spread_preference: String,
    payment_details: serde_json::Value,
    protocol_fee_percentage: Decimal,
    protocol_fee_amount: Decimal,
    escrow_tx_hash: Option<String>,
    release_tx_hash: Option<String>,
    refund_tx_hash: Option<String>,
    escrow_debited_kind: Option<String>,
    escrow_debited_id: Option<Uuid>,
    escrow_debited_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    escrowed_at: Option<DateTime<Utc>>,
    payment_sent_at: Option<DateTime<Utc>>,
    payment_confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

fn parse_order_type(s: &str) -> Result<OrderType> {
    match s {
        "buy" => Ok(OrderType::Buy),
        "sell" => Ok(OrderType::Sell),
        other => Err(OrderError::Validation(format!("unknown order type: {other}"))),
    }
}

fn parse_spread(s: &str) -> Result<SpreadPreference> {
    match s {
        "cheap" => Ok(SpreadPreference::Cheap),
        "best" => Ok(SpreadPreference::Best),
        "fastest" => Ok(SpreadPreference::Fastest),
        other => Err(OrderError::Validation(format!("unknown spread preference: {other}"))),
    }
}

fn parse_party_kind(s: &str) -> Result<PartyKind> {
    match s {
        "user" => Ok(PartyKind::User),
        "merchant" => Ok(PartyKind::Merchant),
        other => Err(OrderError::Validation(format!("unknown party kind: {other}"))),
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;

    fn try_from(row: OrderRow) -> Result<Order> {
        Ok(Order {
            id: OrderId(row.id),
            order_number: row.order_number,
            order_type: parse_order_type(&row.order_type)?,
            status: row.status.parse()?,
            order_version: row.order_version,
            offer_id: row.offer_id,
            user_id: row.user_id,
            merchant_id: row.merchant_id,
            buyer_merchant_id: row.buyer_merchant_id,
            crypto_asset: row.crypto_asset,
            crypto_amount: row.crypto_amount,
            fiat_currency: row.fiat_currency,
            fiat_amount: row.fiat_amount,
            rate: row.rate,
            spread_preference: parse_spread(&row.spread_preference)?,
            payment_details: serde_json::from_value(row.payment_details)
                .map_err(|e| OrderError::Internal(format!("corrupt payment_details: {e}")))?,
            protocol_fee_percentage: row.protocol_fee_percentage,
            protocol_fee_amount: row.protocol_fee_amount,
            escrow_tx_hash: row.escrow_tx_hash.map(TxHash),
            release_tx_hash: row.release_tx_hash.map(TxHash),
            refund_tx_hash: row.refund_tx_hash.map(TxHash),
            escrow_debited_kind: row.escrow_debited_kind.map(|s| parse_party_kind(&s)).transpose()?,
            escrow_debited_id: row.escrow_debited_id,
            escrow_debited_amount: row.escrow_debited_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
            accepted_at: row.accepted_at,
            escrowed_at: row.escrowed_at,
            payment_sent_at: row.payment_sent_at,
            payment_confirmed_at: row.payment_confirmed_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, order_number, order_type, status, order_version, offer_id, \
     user_id, merchant_id, buyer_merchant_id, \
     crypto_asset, crypto_amount, fiat_currency, fiat_amount, rate, spread_preference, \
     payment_details, protocol_fee_percentage, protocol_fee_amount, \
     escrow_tx_hash, release_tx_hash, refund_tx_hash, \
     escrow_debited_kind, escrow_debited_id, escrow_debited_amount, \
     created_at, updated_at, expires_at, \
     accepted_at, escrowed_at, payment_sent_at, payment_confirmed_at, completed_at, cancelled_at";

/// Allocates the next order number for `day` (`YYYYMMDD-<seq>`) via an
/// atomic counter row, same `ON CONFLICT ... DO UPDATE ... RETURNING` shape
/// `idempotency.rs` uses for conflict handling, here returning the bumped
/// value instead of discarding it.
pub async fn next_order_number(conn: &mut PgConnection, day: chrono::NaiveDate) -> Result<String> {
    let (seq,): (i64,) = sqlx::query_as(
        "INSERT INTO order_number_counters (day, seq) VALUES ($1, 1)
         ON CONFLICT (day) DO UPDATE SET seq = order_number_counters.seq + 1
         RETURNING seq",
    )
    .bind(day)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(format!("{}-{:06}", day.format("%Y%m%d"), seq))
}

pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<()> {
    let query = format!(
        "INSERT INTO orders ({SELECT_COLUMNS}) VALUES \
         ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,\
         $25,$26,$27,$28,$29,$30,$31,$32)"
    );
    sqlx::query(&query)
        .bind(order.id.0)
        .bind(&order.order_number)
        .bind(order.order_type.to_string())
        .bind(order.status.to_string())
        .bind(order.order_version)
        .bind(order.offer_id)
        .bind(order.user_id)
        .bind(order.merchant_id)
        .bind(order.buyer_merchant_id)
        .bind(order.crypto_asset.clone())
        .bind(order.crypto_amount)
        .bind(order.fiat_currency.clone())
        .bind(order.fiat_amount)
        .bind(order.rate)
        .bind(order.spread_preference.to_string())
        .bind(serde_json::to_value(&order.payment_details).map_err(|e| OrderError::Internal(e.to_string()))?)
        .bind(order.protocol_fee_percentage)
        .bind(order.protocol_fee_amount)
        .bind(order.escrow_tx_hash.as_ref().map(|h| h.0.clone()))
        .bind(order.release_tx_hash.as_ref().map(|h| h.0.clone()))
        .bind(order.refund_tx_hash.as_ref().map(|h| h.0.clone()))
        .bind(order.escrow_debited_kind.map(|k| k.to_string()))
        .bind(order.escrow_debited_id)
        .bind(order.escrow_debited_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.expires_at)
        .bind(order.accepted_at)
        .bind(order.escrowed_at)
        .bind(order.payment_sent_at)
        .bind(order.payment_confirmed_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

pub async fn get(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
    let query = format!("SELECT {SELECT_COLUMNS} FROM orders WHERE id = $1");
    let row: Option<OrderRow> = sqlx::query_as(&query)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    row.map(Order::try_from).transpose()
}

/// Row-lock an order for the duration of the caller's transaction. Every
/// `apply_transition` call starts here so concurrent mutations of the same
/// order serialize instead of racing.
pub async fn get_for_update(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
    let query = format!("SELECT {SELECT_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    let row: Option<OrderRow> = sqlx::query_as(&query)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    row.map(Order::try_from).transpose()
}

pub async fn list_by_party(
    conn: &mut PgConnection,
    user_id: Option<Uuid>,
    merchant_id: Option<Uuid>,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM orders
         WHERE ($1::uuid IS NULL OR user_id = $1)
           AND ($2::uuid IS NULL OR merchant_id = $2)
           AND ($3::text IS NULL OR status = $3)
         ORDER BY created_at DESC"
    );
    let rows: Vec<OrderRow> = sqlx::query_as(&query)
        .bind(user_id)
        .bind(merchant_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    rows.into_iter().map(Order::try_from).collect()
}

/// Orders past `expires_at` that have not reached a terminal state — the
/// expiry sweeper's candidate set. Unlocked: the sweeper settles
/// each candidate through `apply_transition`, which takes its own row lock,
/// so two sweeper instances racing on the same order just means the loser's
/// transition is rejected with `OrderTerminal` once the winner commits.
pub async fn list_expirable(conn: &mut PgConnection, now: DateTime<Utc>, limit: i64) -> Result<Vec<Order>> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM orders
         WHERE expires_at <= $1
           AND status NOT IN ('completed', 'cancelled', 'expired')
         ORDER BY expires_at ASC
         LIMIT $2"
    );
    let rows: Vec<OrderRow> = sqlx::query_as(&query)
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    rows.into_iter().map(Order::try_from).collect()
}

/// Persist the fields `apply_transition` is allowed to mutate. Bumps
/// `order_version` and checks it against `expected_version` in the same
/// statement so a concurrent writer that already moved the row loses the
/// race with `VersionConflict` instead of silently overwriting it.
#[allow(clippy::too_many_arguments)]
pub async fn update_after_transition(
    conn: &mut PgConnection,
    order: &Order,
    expected_version: i64,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE orders SET
            status = $1, order_version = $2, updated_at = $3,
            escrow_tx_hash = $4, release_tx_hash = $5, refund_tx_hash = $6,
            escrow_debited_kind = $7, escrow_debited_id = $8, escrow_debited_amount = $9,
            accepted_at = $10, escrowed_at = $11, payment_sent_at = $12,
            payment_confirmed_at = $13, completed_at = $14, cancelled_at = $15
         WHERE id = $16 AND order_version = $17",
    )
    .bind(order.status.to_string())
    .bind(order.order_version)
    .bind(order.updated_at)
    .bind(order.escrow_tx_hash.as_ref().map(|h| h.0.clone()))
    .bind(order.release_tx_hash.as_ref().map(|h| h.0.clone()))
    .bind(order.refund_tx_hash.as_ref().map(|h| h.0.clone()))
    .bind(order.escrow_debited_kind.map(|k| k.to_string()))
    .bind(order.escrow_debited_id)
    .bind(order.escrow_debited_amount)
    .bind(order.accepted_at)
    .bind(order.escrowed_at)
    .bind(order.payment_sent_at)
    .bind(order.payment_confirmed_at)
    .bind(order.completed_at)
    .bind(order.cancelled_at)
    .bind(order.id.0)
    .bind(expected_version)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(OrderError::VersionConflict {
            expected: expected_version,
            actual: order.order_version,
        });
    }
    Ok(())
}
