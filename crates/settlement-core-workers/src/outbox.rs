//! Outbox drain worker. Polls `notification_outbox` for due
//! rows, claims a batch with `SELECT ... FOR UPDATE SKIP LOCKED` so several
//! worker instances can run concurrently without delivering the same
//! notification twice, and hands each row to a `NotificationSink`.
//!
//! Delivery is pluggable rather than a hardcoded HTTP call so a deployment
//! can swap in a different transport (a message queue, a log-only sink for
//! tests) without touching the poll/claim/retry loop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::PgPool;
use tracing::{info, warn};

use settlement_core_store::{db::Store, outbox};
use settlement_core_types::OutboxEnvelope;

/// A destination an outbox row can be delivered to. Implementors report
/// delivery failures as a plain `String` — the worker only needs the text
/// to log and persist onto the outbox row's `last_error` column, not a
/// structured error type of its own.
pub trait NotificationSink: Send + Sync {
    fn deliver<'a>(&'a self, envelope: &'a OutboxEnvelope) -> BoxFuture<'a, Result<(), String>>;
}

/// Posts each envelope as a JSON body to a configured webhook URL.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

impl NotificationSink for WebhookSink {
    fn deliver<'a>(&'a self, envelope: &'a OutboxEnvelope) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async move {
            self.client
                .post(&self.url)
                .json(&serde_json::json!({
                    "event_type": envelope.event_type,
                    "order_id": envelope.order_id.to_string(),
                    "payload": envelope.payload,
                }))
                .send()
                .await
                .map_err(|e| e.to_string())?
                .error_for_status()
                .map_err(|e| e.to_string())?;
            Ok(())
        })
    }
}

/// No configured destination — delivery is a local no-op. Useful for tests
/// and single-process deployments that only read the events table directly.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn deliver<'a>(&'a self, _envelope: &'a OutboxEnvelope) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Clone)]
pub struct OutboxWorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub sink: Arc<dyn NotificationSink>,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 50,
            sink: Arc::new(NoopSink),
        }
    }
}

pub async fn run(store: Store, config: OutboxWorkerConfig) {
    let pool = store.pool().clone();
    loop {
        match drain_once(&pool, &config).await {
            Ok(delivered) if delivered > 0 => info!(delivered, "drained outbox batch"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "outbox drain cycle failed"),
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

async fn drain_once(pool: &PgPool, config: &OutboxWorkerConfig) -> settlement_core_types::Result<usize> {
    let (mut tx, batch) = outbox::claim_batch(pool, config.batch_size).await?;
    let mut delivered = 0;

    for envelope in batch {
        match config.sink.deliver(&envelope).await {
            Ok(()) => {
                outbox::mark_delivered(&mut tx, envelope.id).await?;
                metrics::counter!("outbox_delivered_total").increment(1);
                delivered += 1;
            }
            Err(e) => {
                warn!(order_id = %envelope.order_id, error = %e, "outbox delivery failed");
                outbox::mark_failed(&mut tx, &envelope, &e).await?;
                metrics::counter!("outbox_delivery_failed_total").increment(1);
            }
        }
    }

    tx.commit()
        .await
        .map_err(|e| settlement_core_types::OrderError::Database(e.to_string()))?;
    Ok(delivered)
}
