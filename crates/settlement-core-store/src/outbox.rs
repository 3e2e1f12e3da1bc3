//! Transactional outbox. `stage` is called from inside the
//! same transaction as the order mutation it announces; `claim_batch` /
//! `mark_delivered` / `mark_failed` are called by the drain worker in
//! `settlement-core-workers` against its own short-lived transactions.

use chrono::Utc;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use settlement_core_types::{OrderError, OrderId, OutboxEnvelope, OutboxStatus, Result};

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    order_id: Uuid,
    event_type: String,
    payload: Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    next_attempt_at: chrono::DateTime<Utc>,
    last_error: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<OutboxStatus> {
    Ok(match s {
        "pending" => OutboxStatus::Pending,
        "delivered" => OutboxStatus::Delivered,
        "failed" => OutboxStatus::Failed,
        "poisoned" => OutboxStatus::Poisoned,
        other => return Err(OrderError::Internal(format!("unknown outbox status: {other}"))),
    })
}

impl TryFrom<OutboxRow> for OutboxEnvelope {
    type Error = OrderError;

    fn try_from(row: OutboxRow) -> Result<OutboxEnvelope> {
        Ok(OutboxEnvelope {
            id: row.id,
            order_id: OrderId(row.order_id),
            event_type: row.event_type,
            payload: row.payload,
            status: parse_status(&row.status)?,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

pub async fn stage(
    conn: &mut PgConnection,
    order_id: OrderId,
    event_type: &str,
    payload: Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO notification_outbox (id, order_id, event_type, payload)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(order_id.0)
    .bind(event_type)
    .bind(payload)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

/// Claim up to `limit` due rows for delivery, skipping ones already locked
/// by another worker instance.
pub async fn claim_batch(pool: &PgPool, limit: i64) -> Result<(sqlx::Transaction<'_, sqlx::Postgres>, Vec<OutboxEnvelope>)> {
    let mut tx = pool.begin().await.map_err(|e| OrderError::Database(e.to_string()))?;

    let rows: Vec<OutboxRow> = sqlx::query_as(
        "SELECT id, order_id, event_type, payload, status, attempts, max_attempts,
                next_attempt_at, last_error, created_at
         FROM notification_outbox
         WHERE status IN ('pending', 'failed') AND next_attempt_at <= now()
         ORDER BY next_attempt_at ASC
         LIMIT $1
         FOR UPDATE SKIP LOCKED",
    )
    .bind(limit)
    .fetch_all(&mut *tx)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    let envelopes = rows
        .into_iter()
        .map(OutboxEnvelope::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok((tx, envelopes))
}

pub async fn mark_delivered(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE notification_outbox SET status = 'delivered' WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}

/// Record a failed delivery attempt. Moves the row to `poisoned` once
/// `max_attempts` is reached instead of rescheduling forever.
pub async fn mark_failed(
    conn: &mut PgConnection,
    envelope: &OutboxEnvelope,
    error: &str,
) -> Result<()> {
    let attempts = envelope.attempts + 1;
    let status = if attempts >= envelope.max_attempts {
        OutboxStatus::Poisoned
    } else {
        OutboxStatus::Failed
    };
    let next_attempt_at = Utc::now() + OutboxEnvelope::backoff_delay(attempts);

    sqlx::query(
        "UPDATE notification_outbox
         SET status = $1, attempts = $2, next_attempt_at = $3, last_error = $4
         WHERE id = $5",
    )
    .bind(status.as_str())
    .bind(attempts)
    .bind(next_attempt_at)
    .bind(error)
    .bind(envelope.id)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}
