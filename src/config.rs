//! Configuration loading: a TOML file for the bulk of the policy surface
//! plus environment-variable overrides for a few deployment-specific knobs.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::types::{ChainFamily, ChainId, TokenBalanceConfig};
use alloy::primitives::U256;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Root configuration, loaded once per process at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub hub_chain_id: ChainId,
    pub chains: Vec<ChainConfig>,
    /// `l1_token_address -> chain_id (as string, TOML tables key by string) -> TokenBalanceConfig`.
    /// Use [`AppConfig::token_config_by_chain`] to get `ChainId`-keyed maps.
    pub token_config: HashMap<String, HashMap<String, TokenBalanceConfig>>,
    #[serde(default = "default_wrap_ether_threshold")]
    pub wrap_ether_threshold: U256,
    #[serde(default = "default_wrap_ether_target")]
    pub wrap_ether_target: U256,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub simulation_relayer_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,
    pub family: ChainFamily,
    #[serde(default)]
    pub is_lite_chain: bool,
    #[serde(default)]
    pub is_slow_withdrawal_chain: bool,
    #[serde(default)]
    pub has_fast_ramp: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_wrap_ether_threshold() -> U256 {
    U256::from(1_000_000_000_000_000_000u128) // 1 ETH
}

fn default_wrap_ether_target() -> U256 {
    U256::from(2_000_000_000_000_000_000u128) // 2 ETH
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file: {}", path.as_ref().display()))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn enabled_chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().filter(|c| c.enabled).map(|c| c.chain_id).collect()
    }

    /// Resolves `token_config` for one L1 token into a `ChainId`-keyed map.
    /// Entries whose chain-id key fails to parse are skipped with a warning
    /// rather than failing the whole lookup.
    pub fn token_config_by_chain(&self, l1_token: &str) -> HashMap<ChainId, TokenBalanceConfig> {
        let Some(per_chain) = self.token_config.get(l1_token) else {
            return HashMap::new();
        };
        per_chain
            .iter()
            .filter_map(|(chain_id_str, cfg)| match chain_id_str.parse::<ChainId>() {
                Ok(chain_id) => Some((chain_id, cfg.clone())),
                Err(_) => {
                    tracing::warn!(l1_token, chain_id_str, "invalid chain id in token_config");
                    None
                }
            })
            .collect()
    }
}

/// Reads `MIN_RELAYER_FEE_PCT_<SYMBOL>_<origin>_<destination>`, falling back
/// to `MIN_RELAYER_FEE_PCT_<SYMBOL>`, then to `default_bps` (basis points).
/// Mirrors the env-var-override idiom the bot's original `config.rs` used
/// for `.env`-sourced values.
pub fn min_relayer_fee_pct(
    symbol: &str,
    origin: ChainId,
    destination: ChainId,
    default_bps: u64,
) -> U256 {
    dotenv::dotenv().ok();

    let route_key = format!("MIN_RELAYER_FEE_PCT_{symbol}_{origin}_{destination}");
    let symbol_key = format!("MIN_RELAYER_FEE_PCT_{symbol}");

    let bps = std::env::var(&route_key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .or_else(|| std::env::var(&symbol_key).ok().and_then(|v| v.parse::<u64>().ok()))
        .unwrap_or(default_bps);

    // basis points (1/10_000) -> 18-decimal fixed point
    U256::from(bps) * U256::from(100_000_000_000_000u128)
}

/// The relayer address used as the `from` for gas simulations. Falls back
/// to the zero address if unset, matching the estimator's "best effort"
/// posture on missing configuration for non-fatal paths.
pub fn simulation_relayer_address() -> Option<String> {
    dotenv::dotenv().ok();
    std::env::var("RELAYER_FILL_SIMULATION_ADDRESS").ok()
}
