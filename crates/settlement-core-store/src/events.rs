use chrono::Utc;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use settlement_core_types::{Actor, OrderError, OrderId, OrderStatus, Result};

/// Append one row to the audit trail and the status-history timeline
///. Always called from
/// inside the same transaction as the order row update it describes.
pub async fn record(
    conn: &mut PgConnection,
    order_id: OrderId,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    actor: &Actor,
    order_version: i64,
    metadata: Value,
) -> Result<()> {
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO order_events
            (id, order_id, from_status, to_status, actor, order_version, metadata, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(Uuid::new_v4())
    .bind(order_id.0)
    .bind(from_status.map(|s| s.to_string()))
    .bind(to_status.to_string())
    .bind(actor.to_string())
    .bind(order_version)
    .bind(metadata)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, entered_at) VALUES ($1, $2, $3)",
    )
    .bind(order_id.0)
    .bind(to_status.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    Ok(())
}
