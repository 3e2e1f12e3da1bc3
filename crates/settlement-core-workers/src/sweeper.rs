//! Expiry sweeper. Periodically finds non-terminal orders past
//! their `expires_at` and transitions them to `expired`, refunding escrow
//! along the way when one was locked.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};

use settlement_core_store::{db::Store, escrow, orders};
use settlement_core_types::{Actor, OrderStatus};

#[derive(Clone, Debug)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub batch_size: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 100,
        }
    }
}

pub async fn run(store: Store, config: SweeperConfig) {
    let pool = store.pool().clone();
    loop {
        match sweep_once(&pool, &config).await {
            Ok(swept) if swept > 0 => info!(swept, "swept expired orders"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "expiry sweep cycle failed"),
        }
        tokio::time::sleep(config.interval).await;
    }
}

async fn sweep_once(pool: &PgPool, config: &SweeperConfig) -> settlement_core_types::Result<usize> {
    let now = Utc::now();
    let candidates = {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
        orders::list_expirable(&mut conn, now, config.batch_size).await?
    };

    let mut swept = 0;
    for order in candidates {
        match escrow::refund_escrow(pool, order.id, Actor::System, OrderStatus::Expired, None).await {
            Ok(_) => {
                metrics::counter!("orders_expired_total").increment(1);
                swept += 1;
            }
            Err(settlement_core_types::OrderError::OrderTerminal(_)) => {
                // Another sweeper instance (or a user action) already moved
                // this order on; nothing left to do.
            }
            Err(e) => warn!(order_id = %order.id, error = %e, "failed to expire order"),
        }
    }
    Ok(swept)
}
