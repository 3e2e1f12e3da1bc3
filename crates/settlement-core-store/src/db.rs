//! Connection pool wrapper.
//!
//! Named tables:
//!   orders              — the order aggregate root
//!   order_events        — append-only transition audit trail
//!   order_status_history — denormalized status timeline for read APIs
//!   party_balances      — per-(party, currency) spendable balance
//!   ledger_entries      — append-only balance movement log
//!   notification_outbox — transactional outbox for at-least-once delivery
//!   disputes            — two-party confirmation sub-machine state
//!   idempotency_keys    — replayed-response cache for retried mutations

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use settlement_core_types::{OrderError, Result};

#[derive(Clone)]
pub struct Store {
    pub(crate) pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| OrderError::Database(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderError::Database(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
