//! Core data model for the relayer decision engine: chain/token identity,
//! deposits, balance configuration, and the records produced by the
//! profit and inventory components.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use alloy::primitives::{Address as EvmAddress, U256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Numeraire chain id. The hub chain is configured separately (see
/// [`crate::config::AppConfig::hub_chain_id`]); everything else is a spoke.
pub type ChainId = u64;

/// Which address family a chain belongs to. Needed because spoke chains are
/// not all EVM (e.g. Solana-style spokes use 32-byte addresses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainFamily {
    Evm,
    Svm,
}

/// A chain-native address, tagged by family so cross-family comparisons are
/// never silently true. `Svm` addresses are stored as raw 32-byte pubkeys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Evm(EvmAddress),
    Svm([u8; 32]),
}

impl Address {
    pub fn kind(&self) -> ChainFamily {
        match self {
            Address::Evm(_) => ChainFamily::Evm,
            Address::Svm(_) => ChainFamily::Svm,
        }
    }

    /// Canonical string form used as a map key across chain families.
    pub fn to_native(&self) -> String {
        match self {
            Address::Evm(a) => format!("{a:?}"),
            Address::Svm(bytes) => hex_encode(bytes),
        }
    }

    pub fn as_evm(&self) -> Option<EvmAddress> {
        match self {
            Address::Evm(a) => Some(*a),
            Address::Svm(_) => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_native())
    }
}

fn hex_encode(bytes: &[u8; 32]) -> String {
    let mut out = String::with_capacity(64);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Static symbol -> per-chain token metadata table. In production this is
/// populated from protocol constants; tests populate a small fixture subset.
pub static TOKEN_SYMBOLS_MAP: Lazy<HashMap<&'static str, TokenSymbolEntry>> =
    Lazy::new(HashMap::new);

/// Display-symbol -> canonical-symbol remapping (e.g. "ETH" -> "WETH" on
/// chains where the gas token and its wrapped equivalent are treated as one
/// token for balance/pricing purposes).
pub static TOKEN_EQUIVALENCE_REMAPPING: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| {
        let mut m = HashMap::new();
        m.insert("ETH", "WETH");
        m.insert("MATIC", "WMATIC");
        m
    });

#[derive(Debug, Clone)]
pub struct TokenSymbolEntry {
    pub decimals: u8,
    pub addresses: HashMap<ChainId, Address>,
}

/// An intent deposit originated on one chain to be filled on another.
#[derive(Debug, Clone)]
pub struct Deposit {
    pub deposit_id: U256,
    pub origin: ChainId,
    pub destination: ChainId,
    pub input_token: Address,
    pub input_amount: U256,
    pub output_token: Address,
    pub output_amount: U256,
    pub updated_output_amount: Option<U256>,
    pub has_message: bool,
    pub fill_deadline: u64,
    pub exclusivity_deadline: u64,
    pub exclusive_relayer: Option<Address>,
    pub from_lite_chain: bool,
    pub to_lite_chain: bool,
    pub depositor: Address,
    pub recipient: Address,
    pub quote_timestamp: u64,
}

impl Deposit {
    /// Output amount the profit engine should actually use: the smaller of
    /// `output_amount` and `updated_output_amount`, when the latter is
    /// present. An update can only lower what the relayer owes, never raise it.
    pub fn effective_output_amount(&self) -> U256 {
        match self.updated_output_amount {
            Some(updated) => updated.min(self.output_amount),
            None => self.output_amount,
        }
    }
}

/// Per (L1 token, chain[, L2 token]) allocation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalanceConfig {
    /// Desired allocation fraction, 18-decimal fixed point.
    pub target_pct: U256,
    /// Allocation fraction below which a rebalance fires.
    pub threshold_pct: U256,
    /// Multiplier applied to `target_pct` when judging repayment eligibility.
    #[serde(default = "default_overage_buffer")]
    pub target_overage_buffer: U256,
    pub unwrap_weth_threshold: Option<U256>,
    pub unwrap_weth_target: Option<U256>,
    /// Seconds; presence enables L2->L1 excess withdrawal for this token/chain.
    pub withdraw_excess_period: Option<u64>,
}

pub fn default_overage_buffer() -> U256 {
    // 1.5x in 18-decimal fixed point.
    U256::from(1_500_000_000_000_000_000u128)
}

/// Result of the profit calculation for one deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillProfit {
    pub input_usd: U256,
    pub output_usd: U256,
    pub lp_fee_usd: U256,
    pub gross_relayer_fee_usd: U256,
    pub gross_relayer_fee_pct: U256,
    pub net_relayer_fee_usd: U256,
    pub net_relayer_fee_pct: U256,
    pub gas_cost_native: U256,
    pub gas_cost_token: U256,
    pub gas_cost_usd: U256,
    pub gas_price: U256,
    pub profitable: bool,
}

/// One planned rebalance transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebalance {
    pub chain_id: ChainId,
    pub l1_token: Address,
    pub l2_token: Address,
    pub current_alloc_pct: U256,
    pub target_pct: U256,
    pub threshold_pct: U256,
    pub balance: U256,
    pub cumulative_balance: U256,
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct CrossChainTransfer {
    pub relayer: Address,
    pub l1_token: Address,
    pub l2_token: Address,
    pub chain_id: ChainId,
    pub amount: U256,
    pub status: TransferStatus,
}

/// 18-decimal USD price of one whole unit of a token.
pub type Price = U256;
