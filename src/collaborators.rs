//! Capability traits for every external system the decision engine reads
//! from or issues actions through. No concrete implementation ships in this
//! crate: production wiring (RPC clients, HTTP price feeds, bridge adapters)
//! is out of scope. Each trait is injected as `Arc<dyn Trait>` so the core
//! never holds a mutable back-reference into a collaborator.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::types::{Address, ChainId};
use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// On-chain token balance reads, plus the local reservation mechanism the
/// rebalance planner uses to avoid double-spending the hub's L1 balance
/// within a single planning pass.
#[async_trait]
pub trait TokenBalanceClient: Send + Sync {
    async fn get_balance(&self, chain_id: ChainId, token: &Address) -> Result<U256>;

    /// Outstanding fill commitments not yet reflected in on-chain balance.
    async fn get_shortfall(&self, chain_id: ChainId, token: &Address) -> Result<U256>;

    /// Reserve `amount` locally so a subsequent read within the same pass
    /// reflects the pending spend before the real transaction confirms.
    fn decrement_local_balance(&self, chain_id: ChainId, token: &Address, amount: U256);
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    pub address: Address,
}

/// Reads against the hub pool contract: token metadata, routing predicates,
/// and validated running-balance history.
#[async_trait]
pub trait HubPoolClient: Send + Sync {
    async fn get_token_info(&self, token: &Address, chain_id: ChainId) -> Result<TokenInfo>;

    async fn l2_token_has_pool_rebalance_route(
        &self,
        l2_token: &Address,
        chain_id: ChainId,
    ) -> Result<bool>;

    async fn l2_token_enabled_for_l1_token(
        &self,
        l1_token: &Address,
        chain_id: ChainId,
    ) -> Result<bool>;

    async fn get_running_balance_before_block(
        &self,
        l1_token: &Address,
        chain_id: ChainId,
        block: u64,
    ) -> Result<U256>;

    async fn get_latest_executed_root_bundle_end_block(
        &self,
        l1_token: &Address,
        chain_id: ChainId,
    ) -> Result<u64>;

    async fn are_tokens_equivalent(
        &self,
        a: &Address,
        chain_a: ChainId,
        b: &Address,
        chain_b: ChainId,
    ) -> Result<bool>;
}

/// Protocol-level target balances, sourced from the config store contract.
#[async_trait]
pub trait ConfigStoreClient: Send + Sync {
    async fn get_spoke_target_balance(
        &self,
        l1_token: &Address,
        chain_id: ChainId,
    ) -> Result<U256>;
}

/// Refund and upcoming-deposit projections derived from pending bundles.
#[async_trait]
pub trait BundleDataClient: Send + Sync {
    async fn get_pending_refunds(&self, l1_token: &Address, chain_id: ChainId) -> Result<U256>;

    async fn get_next_bundle_refunds(&self, l1_token: &Address, chain_id: ChainId) -> Result<U256>;

    async fn get_total_refund(&self, l1_token: &Address) -> Result<HashMap<ChainId, U256>>;

    async fn get_upcoming_deposit_amount(
        &self,
        l1_token: &Address,
        chain_id: ChainId,
        since_block: u64,
    ) -> Result<U256>;
}

/// Pending (not yet finalized) cross-chain transfers, keyed by relayer and
/// token, used by the accountant to fold in-flight inventory movements into
/// the effective balance.
#[async_trait]
pub trait CrossChainTransferClient: Send + Sync {
    async fn get_outstanding_transfer_amount(
        &self,
        relayer: &Address,
        chain_id: ChainId,
        l1_token: &Address,
        l2_token: Option<&Address>,
    ) -> Result<U256>;

    fn record_outstanding_transfer(
        &self,
        chain_id: ChainId,
        l1_token: &Address,
        l2_token: &Address,
        amount: U256,
    );
}

/// Bridge action surface: actually moving tokens between chains. The
/// rebalance planner calls these sequentially, never concurrently, because
/// submissions on a given chain share a signing nonce.
#[async_trait]
pub trait AdapterManager: Send + Sync {
    async fn send_token_cross_chain(
        &self,
        l1_token: &Address,
        l2_token: &Address,
        chain_id: ChainId,
        amount: U256,
    ) -> Result<()>;

    async fn withdraw_token_from_l2(
        &self,
        l1_token: &Address,
        l2_token: &Address,
        chain_id: ChainId,
        amount: U256,
    ) -> Result<()>;

    async fn get_l2_pending_withdrawal_amount(
        &self,
        l2_token: &Address,
        chain_id: ChainId,
        period_seconds: u64,
    ) -> Result<U256>;

    async fn wrap_native_if_above_threshold(
        &self,
        chain_id: ChainId,
        threshold: U256,
        target: U256,
    ) -> Result<()>;

    /// Ensures the adapter contract for `chain_id` holds sufficient
    /// allowance over `l1_token` before a cross-chain send is submitted.
    async fn set_l1_token_approvals(&self, l1_token: &Address, chain_id: ChainId) -> Result<()>;
}

/// Ordered-fallback USD price source. Implementations typically wrap
/// multiple upstream feeds and return the first that resolves a price.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_prices_by_address(&self, addresses: &[Address]) -> Result<HashMap<Address, U256>>;
}

/// Per-chain fill simulation. Returns native gas units, destination gas
/// token units, and the gas price used, or an error the estimator maps to
/// the `U256::MAX` sentinel.
#[async_trait]
pub trait GasSimulationFeed: Send + Sync {
    async fn simulate_fill(
        &self,
        chain_id: ChainId,
        relayer: &Address,
        output_token: &Address,
        amount: U256,
        has_message: bool,
    ) -> Result<(U256, U256, U256)>;
}
