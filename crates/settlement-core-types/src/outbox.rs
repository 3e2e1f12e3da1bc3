use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::OrderId;

/// Delivery state of a staged notification. Rows are inserted in the same database transaction as the
/// state change they describe and drained by a separate worker — see
/// `settlement-core-workers::outbox`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Delivered,
    Failed,
    Poisoned,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Failed => "failed",
            OutboxStatus::Poisoned => "poisoned",
        }
    }
}

/// A staged, at-least-once-delivered notification of an order event.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct OutboxEnvelope {
    pub id: Uuid,
    pub order_id: OrderId,
    pub event_type: String,
    pub payload: Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutboxEnvelope {
    /// Exponential backoff with a ceiling, applied after each failed
    /// delivery attempt.
    pub fn backoff_delay(attempts: i32) -> chrono::Duration {
        let capped = attempts.clamp(0, 8);
        let seconds = 2i64.saturating_pow(capped as u32).min(3600);
        chrono::Duration::seconds(seconds)
    }

    pub fn is_poisoned(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
