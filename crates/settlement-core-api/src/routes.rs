use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the full HTTP surface: one route per lifecycle operation, with
/// verbs and status codes chosen for a conventional REST resource model.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders", post(handlers::create_order).get(handlers::list_orders))
        .route("/orders/{id}", get(handlers::get_order).delete(handlers::cancel_order))
        .route("/orders/{id}/accept", patch(handlers::accept_order))
        .route(
            "/orders/{id}/escrow",
            post(handlers::lock_escrow).patch(handlers::release_escrow),
        )
        .route("/orders/{id}/payment-sent", post(handlers::mark_payment_sent))
        .route("/orders/{id}/payment-confirmed", post(handlers::confirm_payment))
        .route("/orders/{id}/expire", post(handlers::expire_order))
        .route("/orders/{id}/dispute", post(handlers::open_dispute))
        .route("/orders/{id}/dispute/propose", post(handlers::propose_resolution))
        .route("/orders/{id}/dispute/confirm", post(handlers::confirm_resolution))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
