use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use settlement_core_types::{ErrorCategory, OrderError};

/// `{success, data, error}` envelope every handler responds with. Also
/// deserializable so a cached idempotency-key response can be replayed
/// verbatim instead of rebuilt.
#[derive(Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

pub struct ApiError(pub OrderError);

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        ApiError(e)
    }
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::InvalidTransition => StatusCode::CONFLICT,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error serving request");
        }
        let body: Envelope<()> = Envelope { success: false, data: None, error: Some(self.0.to_string()) };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
