//! Idempotency-key replay cache. A client that
//! retries a mutating request with the same key gets back the exact
//! response the first attempt produced, instead of re-applying it.

use serde_json::Value;
use sqlx::PgConnection;

use settlement_core_types::{OrderError, OrderId, Result};

pub struct CachedResponse {
    pub status_code: u16,
    pub body: Value,
}

/// Look up a previously recorded response for `key`. Callers check this
/// before running the mutation so a retried request short-circuits.
pub async fn lookup(conn: &mut PgConnection, key: &str) -> Result<Option<CachedResponse>> {
    let row: Option<(Value, i32)> = sqlx::query_as(
        "SELECT response_body, status_code FROM idempotency_keys WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;

    Ok(row.map(|(body, status_code)| CachedResponse {
        status_code: status_code as u16,
        body,
    }))
}

/// Record the response produced for `key` so a later retry with the same
/// key can replay it instead of re-running the mutation. `ON CONFLICT DO
/// NOTHING` means whichever caller wins a race to store first is the
/// version every retry sees.
pub async fn store(
    conn: &mut PgConnection,
    key: &str,
    actor: &str,
    order_id: Option<OrderId>,
    status_code: u16,
    body: Value,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO idempotency_keys (key, actor, order_id, response_body, status_code)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (key) DO NOTHING",
    )
    .bind(key)
    .bind(actor)
    .bind(order_id.map(|o| o.0))
    .bind(body)
    .bind(status_code as i32)
    .execute(&mut *conn)
    .await
    .map_err(|e| OrderError::Database(e.to_string()))?;
    Ok(())
}
