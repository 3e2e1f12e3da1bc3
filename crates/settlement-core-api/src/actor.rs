use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use settlement_core_types::{Actor, OrderError};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the calling `Actor` from `x-actor-type` / `x-actor-id`, or from
/// `x-system-secret` for system-driven calls.
pub struct CallingActor(pub Actor);

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CallingActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let actor_type = header(parts, "x-actor-type")
            .ok_or_else(|| OrderError::Validation("missing x-actor-type header".into()))?;

        let actor = match actor_type.as_str() {
            "user" => {
                let id = header(parts, "x-actor-id")
                    .ok_or_else(|| OrderError::Validation("missing x-actor-id header".into()))?;
                let id = Uuid::parse_str(&id)
                    .map_err(|_| OrderError::Validation("x-actor-id is not a valid uuid".into()))?;
                Actor::User { id }
            }
            "merchant" => {
                let id = header(parts, "x-actor-id")
                    .ok_or_else(|| OrderError::Validation("missing x-actor-id header".into()))?;
                let id = Uuid::parse_str(&id)
                    .map_err(|_| OrderError::Validation("x-actor-id is not a valid uuid".into()))?;
                Actor::Merchant { id }
            }
            "system" => {
                let secret = header(parts, "x-system-secret").unwrap_or_default();
                if secret != state.config.system_secret {
                    return Err(OrderError::Forbidden {
                        actor: "system".into(),
                        target: "this endpoint".into(),
                    }
                    .into());
                }
                Actor::System
            }
            other => {
                return Err(OrderError::Validation(format!("unknown x-actor-type: {other}")).into());
            }
        };

        Ok(CallingActor(actor))
    }
}
