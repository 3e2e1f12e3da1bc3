//! settlement-core-cli
//!
//! Operator CLI for a running settlement core node. Talks to the HTTP API
//! as the system actor, so it needs the same shared secret the node was
//! started with.
//!
//! Usage:
//!   settlement-core-cli inspect --order-id <uuid>     [--api <url>]
//!   settlement-core-cli expire  --order-id <uuid>      [--api <url>]

use clap::{Parser, Subcommand};
use tracing::info;

mod api_client;
use api_client::ApiClient;

#[derive(Parser, Debug)]
#[command(
    name = "settlement-core-cli",
    version,
    about = "Operator CLI for settlement-core-node"
)]
struct Args {
    /// Node API base URL.
    #[arg(long, global = true, env = "SETTLEMENT_API_URL", default_value = "http://127.0.0.1:8080")]
    api: String,

    /// Shared system secret, same as the node's `--system-secret`.
    #[arg(long, global = true, env = "SYSTEM_SECRET")]
    system_secret: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the full current state of an order.
    Inspect {
        #[arg(long)]
        order_id: String,
    },

    /// Force-expire an order out of cycle, refunding escrow if locked.
    Expire {
        #[arg(long)]
        order_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let client = ApiClient::new(&args.api, &args.system_secret);

    match args.command {
        Command::Inspect { order_id } => {
            let order = client.get_order(&order_id).await?;
            println!("{}", serde_json::to_string_pretty(&order)?);
        }
        Command::Expire { order_id } => {
            let result = client.expire_order(&order_id).await?;
            info!(order_id, "order expired");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
