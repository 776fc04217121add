//! Inventory Manager: multi-chain balance accounting, repayment chain
//! selection, and rebalance planning.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

pub mod balance;
pub mod rebalance;
pub mod selector;

pub use balance::VirtualBalanceAccountant;
pub use rebalance::RebalancePlanner;
pub use selector::RepaymentChainSelector;

use crate::collaborators::{
    AdapterManager, BundleDataClient, ConfigStoreClient, CrossChainTransferClient, HubPoolClient,
    TokenBalanceClient,
};
use crate::config::AppConfig;
use crate::gas::GasCostEstimator;
use crate::inventory::balance::L2TokenRoute;
use crate::inventory::rebalance::ChainTokenEntry;
use crate::inventory::selector::{ChainAllocationConfig, SelectionContext};
use crate::price::PriceCache;
use crate::types::{Address, ChainId, Deposit, Rebalance};
use alloy::primitives::{Address as EvmAddress, U256};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Coordinator that owns strong references to every inventory-related
/// collaborator and wires the accountant, selector, and planner together.
/// Holds the only mutable-shaped state in the inventory subsystem; the
/// components it owns are themselves side-effect-free given their inputs.
pub struct InventoryManager {
    pub accountant: VirtualBalanceAccountant,
    pub selector: RepaymentChainSelector,
    pub planner: RebalancePlanner,
    hub_pool: Arc<dyn HubPoolClient>,
    token_balances: Arc<dyn TokenBalanceClient>,
    config: Arc<AppConfig>,
    prices: PriceCache,
    gas: Arc<GasCostEstimator>,
    enabled_chains: Vec<ChainId>,
    hub_chain_id: ChainId,
    /// Output token used to template the gas estimator's per-chain
    /// messageless-fill simulation, keyed by chain.
    gas_template_tokens: HashMap<ChainId, Address>,
    gas_template_amount: U256,
    /// Every address whose USD price the profit/inventory components
    /// consult; refreshed alongside gas costs each tick.
    price_addresses: Vec<Address>,
}

impl InventoryManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_balances: Arc<dyn TokenBalanceClient>,
        hub_pool: Arc<dyn HubPoolClient>,
        config_store: Arc<dyn ConfigStoreClient>,
        bundle_data: Arc<dyn BundleDataClient>,
        transfers: Arc<dyn CrossChainTransferClient>,
        adapters: Arc<dyn AdapterManager>,
        config: Arc<AppConfig>,
        prices: PriceCache,
        gas: Arc<GasCostEstimator>,
        gas_template_tokens: HashMap<ChainId, Address>,
        gas_template_amount: U256,
        price_addresses: Vec<Address>,
    ) -> Self {
        let enabled_chains = config.enabled_chain_ids();
        let hub_chain_id = config.hub_chain_id;

        let accountant = VirtualBalanceAccountant::new(
            Arc::clone(&token_balances),
            Arc::clone(&transfers),
            enabled_chains.clone(),
        );
        let selector = RepaymentChainSelector::new(
            Arc::clone(&hub_pool),
            Arc::clone(&config_store),
            Arc::clone(&bundle_data),
            accountant.clone(),
            hub_chain_id,
        );
        let planner = RebalancePlanner::new(
            accountant.clone(),
            Arc::clone(&adapters),
            Arc::clone(&token_balances),
            enabled_chains.clone(),
            hub_chain_id,
        );

        Self {
            accountant,
            selector,
            planner,
            hub_pool,
            token_balances,
            config,
            prices,
            gas,
            enabled_chains,
            hub_chain_id,
            gas_template_tokens,
            gas_template_amount,
            price_addresses,
        }
    }

    /// §4.10/§5 per-tick refresh: the price cache and the gas cost
    /// estimator's messageless cache are refreshed concurrently and both
    /// awaited, so no caller observes one refreshed and the other stale.
    /// Also clears the selector's per-tick memoization so the new tick
    /// re-fetches rather than reusing last tick's in-flight results.
    pub async fn update(&self) -> Result<()> {
        self.selector.clear_tick_memo();

        let price_addresses = self.price_addresses.clone();
        let price_fut = self.prices.update(&price_addresses);

        let gas_chains = self.enabled_chains.clone();
        let gas_tokens = self.gas_template_tokens.clone();
        let gas_amount = self.gas_template_amount;
        let gas_fut = async move {
            self.gas
                .refresh_messageless_cache(
                    &gas_chains,
                    move |chain_id| gas_tokens.get(&chain_id).cloned().unwrap_or_else(zero_evm_address),
                    gas_amount,
                )
                .await;
            Ok::<(), anyhow::Error>(())
        };

        tokio::try_join!(price_fut, gas_fut)?;
        Ok(())
    }

    /// Returns the ordered repayment chain list for `deposit`, assembling the
    /// selector's [`SelectionContext`] from owned configuration and hub pool
    /// state.
    pub async fn repayment_chains_for(&self, deposit: &Deposit, l1_token: &Address) -> Result<Vec<ChainId>> {
        let ctx = self.build_selection_context(l1_token).await?;
        self.selector.select_with_context(deposit, l1_token, &ctx).await
    }

    pub async fn plan_rebalances(&self, l1_token: &Address) -> Result<Vec<Rebalance>> {
        let hub_info = self.hub_pool.get_token_info(l1_token, self.hub_chain_id).await?;
        let token_configs = self.config.token_config_by_chain(&l1_token.to_native());

        let mut entries = Vec::new();
        for &chain_id in &self.enabled_chains {
            if chain_id == self.hub_chain_id {
                continue;
            }
            let Some(cfg) = token_configs.get(&chain_id) else {
                continue;
            };
            if !self.hub_pool.l2_token_enabled_for_l1_token(l1_token, chain_id).await? {
                continue;
            }
            let route_info = self.hub_pool.get_token_info(l1_token, chain_id).await?;
            entries.push(ChainTokenEntry {
                chain_id,
                routes: vec![L2TokenRoute { l2_token: route_info.address, decimals: route_info.decimals }],
                config: cfg.clone(),
            });
        }

        let hub_l1_balance = self.token_balances.get_balance(self.hub_chain_id, l1_token).await?;
        self.planner
            .plan_l1_to_l2_for(l1_token, hub_info.decimals, &entries, hub_l1_balance)
            .await
    }

    /// Assembles a [`SelectionContext`] by resolving the per-chain L2 token
    /// (via the hub pool client's [`HubPoolClient::get_token_info`]) and
    /// allocation policy (from owned [`AppConfig`]) for every enabled chain
    /// the L1 token routes to.
    async fn build_selection_context(&self, l1_token: &Address) -> Result<SelectionContext> {
        let hub_info = self.hub_pool.get_token_info(l1_token, self.hub_chain_id).await?;
        let token_configs = self.config.token_config_by_chain(&l1_token.to_native());

        let mut chain_routes = HashMap::new();
        let mut chain_allocation = HashMap::new();

        for &chain_id in &self.enabled_chains {
            let Some(cfg) = token_configs.get(&chain_id) else {
                continue;
            };
            if chain_id != self.hub_chain_id
                && !self.hub_pool.l2_token_enabled_for_l1_token(l1_token, chain_id).await?
            {
                continue;
            }
            let route_info = self.hub_pool.get_token_info(l1_token, chain_id).await?;
            let chain_cfg = self.config.chain(chain_id);

            chain_routes.insert(chain_id, vec![L2TokenRoute { l2_token: route_info.address, decimals: route_info.decimals }]);
            chain_allocation.insert(
                chain_id,
                ChainAllocationConfig {
                    target_pct: cfg.target_pct,
                    threshold_pct: cfg.threshold_pct,
                    target_overage_buffer: cfg.target_overage_buffer,
                    is_slow_withdrawal_chain: chain_cfg.map(|c| c.is_slow_withdrawal_chain).unwrap_or(false),
                    has_fast_ramp: chain_cfg.map(|c| c.has_fast_ramp).unwrap_or(false),
                },
            );
        }

        Ok(SelectionContext {
            l1_decimals: hub_info.decimals,
            inventory_management_enabled: !chain_routes.is_empty(),
            prioritize_slow_withdrawal_chains: true,
            chain_routes,
            chain_allocation,
        })
    }
}

fn zero_evm_address() -> Address {
    Address::Evm(EvmAddress::ZERO)
}
