use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use settlement_core_store::{dispute, escrow, lifecycle, orders};
use settlement_core_types::{Actor, Order, OrderId, OrderStatus};

use crate::actor::CallingActor;
use crate::dto::{
    AcceptOrderRequest, ConfirmAction, ConfirmResolutionRequest, CreateOrderRequest, ListOrdersQuery,
    OpenDisputeRequest, OrderResponse, ProposeResolutionRequest, VersionedRequest,
};
use crate::error::{ApiResult, Envelope};
use crate::idempotency::{with_idempotency, IdempotencyKey};
use crate::state::AppState;

type Reply<T> = ApiResult<(StatusCode, Json<Envelope<T>>)>;

fn ok<T: serde::Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (status, Json(Envelope::ok(data)))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn create_order(
    State(state): State<AppState>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<CreateOrderRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, None, StatusCode::CREATED, || async {
        let Actor::User { id: user_id } = actor else {
            return Err(settlement_core_types::OrderError::Forbidden {
                actor: actor.to_string(),
                target: "create_order".into(),
            }
            .into());
        };

        if req.crypto_amount <= rust_decimal::Decimal::ZERO || req.fiat_amount <= rust_decimal::Decimal::ZERO {
            return Err(settlement_core_types::OrderError::ZeroAmount.into());
        }

        let now = chrono::Utc::now();
        let ttl = req
            .ttl_minutes
            .map(chrono::Duration::minutes)
            .unwrap_or(state.config.default_order_ttl);

        let protocol_fee_percentage = req.spread_preference.fee_percent();
        let protocol_fee_amount = (req.crypto_amount * protocol_fee_percentage / rust_decimal::Decimal::from(100))
            .round_dp(req.crypto_amount.scale());

        let mut conn = state
            .store
            .pool()
            .acquire()
            .await
            .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
        let order_number = orders::next_order_number(&mut conn, now.date_naive()).await?;
        drop(conn);

        let order = Order {
            id: OrderId::new(),
            order_number,
            order_type: req.order_type,
            status: OrderStatus::Pending,
            order_version: 1,
            offer_id: req.offer_id,
            user_id,
            merchant_id: req.merchant_id,
            buyer_merchant_id: req.buyer_merchant_id,
            crypto_asset: req.crypto_asset,
            crypto_amount: req.crypto_amount,
            fiat_currency: req.fiat_currency,
            fiat_amount: req.fiat_amount,
            rate: req.rate,
            spread_preference: req.spread_preference,
            payment_details: req.payment_details,
            protocol_fee_percentage,
            protocol_fee_amount,
            escrow_tx_hash: None,
            release_tx_hash: None,
            refund_tx_hash: None,
            escrow_debited_kind: None,
            escrow_debited_id: None,
            escrow_debited_amount: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            accepted_at: None,
            escrowed_at: None,
            payment_sent_at: None,
            payment_confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
        };

        orders::create(state.store.pool(), &order).await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Reply<OrderResponse> {
    let mut conn = state
        .store
        .pool()
        .acquire()
        .await
        .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
    let order = orders::get(&mut conn, OrderId(id))
        .await?
        .ok_or(settlement_core_types::OrderError::OrderNotFound)?;
    Ok(ok(StatusCode::OK, order.into()))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Reply<Vec<OrderResponse>> {
    let mut conn = state
        .store
        .pool()
        .acquire()
        .await
        .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
    let list = orders::list_by_party(&mut conn, query.user_id, query.merchant_id, query.status).await?;
    Ok(ok(StatusCode::OK, list.into_iter().map(OrderResponse::from).collect()))
}

pub async fn accept_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<AcceptOrderRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order =
            lifecycle::accept_order(state.store.pool(), OrderId(id), actor, req.merchant_id, req.expected_version)
                .await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn lock_escrow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order = escrow::lock_escrow(state.store.pool(), OrderId(id), actor, req.expected_version).await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn release_escrow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order = escrow::release_escrow(
            state.store.pool(),
            OrderId(id),
            actor,
            OrderStatus::Completed,
            req.expected_version,
        )
        .await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn mark_payment_sent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order =
            lifecycle::mark_payment_sent(state.store.pool(), OrderId(id), actor, req.expected_version).await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order = lifecycle::confirm_payment(state.store.pool(), OrderId(id), actor, req.expected_version).await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order = escrow::refund_escrow(
            state.store.pool(),
            OrderId(id),
            actor,
            OrderStatus::Cancelled,
            req.expected_version,
        )
        .await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn expire_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<VersionedRequest>,
) -> Reply<OrderResponse> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order = escrow::refund_escrow(
            state.store.pool(),
            OrderId(id),
            actor,
            OrderStatus::Expired,
            req.expected_version,
        )
        .await?;
        Ok(OrderResponse::from(order))
    })
    .await
}

pub async fn open_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<OpenDisputeRequest>,
) -> Reply<settlement_core_types::Dispute> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::CREATED, || async {
        let dispute =
            dispute::open_dispute(state.store.pool(), OrderId(id), actor, req.reason, req.expected_version).await?;
        Ok(dispute)
    })
    .await
}

pub async fn propose_resolution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<ProposeResolutionRequest>,
) -> Reply<settlement_core_types::Dispute> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let dispute = dispute::propose_resolution(state.store.pool(), OrderId(id), actor, req.resolution).await?;
        Ok(dispute)
    })
    .await
}

/// Accepts or rejects the standing proposal. Acceptance records this party's
/// confirmation and, once both parties have confirmed, settles the split and
/// moves the order to the resolution's target status in the same call.
/// Rejection reverts the dispute to `open` with no order status change.
pub async fn confirm_resolution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    CallingActor(actor): CallingActor,
    IdempotencyKey(key): IdempotencyKey,
    Json(req): Json<ConfirmResolutionRequest>,
) -> Reply<settlement_core_types::Dispute> {
    with_idempotency(&state.store, key, &actor, Some(OrderId(id)), StatusCode::OK, || async {
        let order_id = OrderId(id);

        if req.action == ConfirmAction::Reject {
            let dispute_after = dispute::reject_resolution(state.store.pool(), order_id).await?;
            return Ok(dispute_after);
        }

        let dispute_after = dispute::confirm_resolution(state.store.pool(), order_id, actor).await?;

        if let Some(resolution) = dispute_after.resolution {
            let mut conn = state
                .store
                .pool()
                .acquire()
                .await
                .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
            let order = orders::get(&mut conn, order_id)
                .await?
                .ok_or(settlement_core_types::OrderError::OrderNotFound)?;
            dispute::finalize_disputed_order(
                state.store.pool(),
                order_id,
                resolution.target_status(),
                Some(order.order_version),
            )
            .await?;
        }

        Ok(dispute_after)
    })
    .await
}
