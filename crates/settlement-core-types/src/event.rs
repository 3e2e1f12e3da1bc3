use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::OrderId;
use crate::order::OrderStatus;

/// Append-only audit trail row written alongside every state transition.
/// Distinct from the outbox: events are for replay and audit, the outbox
/// is for external delivery.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: OrderId,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor: String,
    pub order_version: i64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
