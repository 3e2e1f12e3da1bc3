use std::future::Future;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use settlement_core_store::Store;
use settlement_core_types::{Actor, OrderError, OrderId};

use crate::error::{ApiResult, Envelope};

/// The optional `idempotency-key` header every mutating endpoint accepts.
/// Absent, the version-check-plus-status-guard on each lifecycle operation
/// is the only protection against duplicate writes: a replayed request
/// just fails with `Conflict` instead of replaying the original result.
pub struct IdempotencyKey(pub Option<String>);

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(IdempotencyKey(key))
    }
}

/// Runs `op` behind an idempotency-key replay check: if `key` has already
/// produced a response, that response is returned verbatim without running
/// `op` again; otherwise `op` runs and its result is cached under `key` for
/// the next retry.
pub async fn with_idempotency<T, F, Fut>(
    store: &Store,
    key: Option<String>,
    actor: &Actor,
    order_id: Option<OrderId>,
    success_status: StatusCode,
    op: F,
) -> ApiResult<(StatusCode, Json<Envelope<T>>)>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    if let Some(key) = &key {
        let mut conn = store
            .pool()
            .acquire()
            .await
            .map_err(|e| OrderError::Database(e.to_string()))?;
        if let Some(cached) = settlement_core_store::idempotency::lookup(&mut conn, key).await? {
            let status = StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::OK);
            let envelope: Envelope<T> = serde_json::from_value(cached.body)
                .map_err(|e| OrderError::Internal(format!("corrupt idempotency record: {e}")))?;
            return Ok((status, Json(envelope)));
        }
    }

    let data = op().await?;
    let envelope = Envelope::ok(data);

    if let Some(key) = &key {
        let mut conn = store
            .pool()
            .acquire()
            .await
            .map_err(|e| OrderError::Database(e.to_string()))?;
        let body = serde_json::to_value(&envelope)
            .map_err(|e| OrderError::Internal(format!("serializing idempotency record: {e}")))?;
        settlement_core_store::idempotency::store(
            &mut conn,
            key,
            &actor.to_string(),
            order_id,
            success_status.as_u16(),
            body,
        )
        .await?;
    }

    Ok((success_status, Json(envelope)))
}
