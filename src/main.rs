//! Cross-chain relayer decision engine entry point.
//!
//! Wires up logging and configuration; the concrete collaborator clients
//! (RPC providers, price feed HTTP clients, bridge adapters) are out of
//! scope for this crate and are expected to be supplied by the host
//! process that links against `relayer-inventory` as a library.

use anyhow::{Context, Result};
use clap::Parser;
use relayer_inventory::AppConfig;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relayer-inventory", about = "Cross-chain relayer decision engine")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "RELAYER_CONFIG_PATH", default_value = "config.toml")]
    config: String,

    /// Tick interval in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    tick_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).with_context(|| "failed to load configuration")?;

    let level: Level = config.log_level.parse().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.to_string()))
        .with_target(false)
        .init();

    info!(hub_chain_id = config.hub_chain_id, chains = config.enabled_chain_ids().len(), "relayer decision engine starting");

    // The concrete collaborator clients (RPC providers, price feed HTTP
    // clients, bridge adapters) are out of scope for this crate; a host
    // process wires them up, constructs an `InventoryManager`, and drives
    // this loop by calling `InventoryManager::update()` each tick followed
    // by `repayment_chains_for`/`plan_rebalances` for the deposits and
    // tokens it cares about.
    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(cli.tick_interval_ms));
    loop {
        interval.tick().await;
        info!("tick: refresh prices and gas costs, recompute inventory allocations");
    }
}
