//! settlement-core-node — the settlement core HTTP service binary.
//!
//! Startup sequence:
//!   1. Connect to Postgres and run migrations
//!   2. Install the Prometheus metrics exporter
//!   3. Spawn the outbox drain worker and the expiry sweeper
//!   4. Serve the lifecycle HTTP API
//!   5. Shut down cleanly on SIGINT/SIGTERM

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use settlement_core_api::{router, ApiConfig, AppState};
use settlement_core_store::Store;
use settlement_core_workers::outbox::{NoopSink, WebhookSink};
use settlement_core_workers::{outbox, sweeper, OutboxWorkerConfig, SweeperConfig};

#[derive(Parser, Debug)]
#[command(
    name = "settlement-core-node",
    version,
    about = "Order lifecycle engine for crypto<->fiat P2P settlement"
)]
struct Args {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Max connections in the Postgres pool.
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 20)]
    db_max_connections: u32,

    /// HTTP listen address for the lifecycle API.
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: SocketAddr,

    /// Prometheus metrics listen address.
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,

    /// Shared secret required on `x-system-secret` for system-actor calls.
    #[arg(long, env = "SYSTEM_SECRET")]
    system_secret: String,

    /// Default order time-to-live in minutes when a request doesn't specify one.
    #[arg(long, env = "DEFAULT_ORDER_TTL_MINUTES", default_value_t = 30)]
    default_order_ttl_minutes: i64,

    /// Outbox drain poll interval, in seconds.
    #[arg(long, env = "OUTBOX_POLL_SECS", default_value_t = 2)]
    outbox_poll_secs: u64,

    /// Outbox webhook URL. Delivery is a local no-op when unset.
    #[arg(long, env = "OUTBOX_WEBHOOK_URL")]
    outbox_webhook_url: Option<String>,

    /// Expiry sweep interval, in seconds.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 30)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,settlement_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("settlement-core-node starting");

    // ── Metrics ───────────────────────────────────────────────────────────────
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(args.metrics_addr)
        .install()
        .context("installing prometheus exporter")?;

    // ── Storage ───────────────────────────────────────────────────────────────
    let store = Store::connect(&args.database_url, args.db_max_connections)
        .await
        .context("connecting to postgres")?;
    store.migrate().await.context("running migrations")?;
    info!("database ready");

    // ── Background workers ──────────────────────────────────────────────────────
    let sink: Arc<dyn outbox::NotificationSink> = match &args.outbox_webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone())),
        None => Arc::new(NoopSink),
    };
    let outbox_config = OutboxWorkerConfig {
        poll_interval: Duration::from_secs(args.outbox_poll_secs),
        batch_size: 50,
        sink,
    };
    let sweeper_config = SweeperConfig {
        interval: Duration::from_secs(args.sweep_interval_secs),
        batch_size: 100,
    };

    let outbox_store = store.clone();
    tokio::spawn(async move { outbox::run(outbox_store, outbox_config).await });

    let sweeper_store = store.clone();
    tokio::spawn(async move { sweeper::run(sweeper_store, sweeper_config).await });

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let state = AppState {
        store,
        config: ApiConfig {
            system_secret: args.system_secret,
            default_order_ttl: chrono::Duration::minutes(args.default_order_ttl_minutes),
        },
    };

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(args.http_addr)
        .await
        .context("binding http listener")?;
    info!(addr = %args.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("settlement-core-node shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
