//! Repayment Chain Selector: for one deposit, the ordered list of chains on
//! which the relayer may safely claim repayment.
//!
//! Grounded on `arbitrage::detector::OpportunityDetector`'s
//! build-candidates-then-filter shape (`scan_opportunities`/
//! `find_best_pools`) and `arbitrage::cooldown::RouteCooldown`'s
//! per-route state tracking, used here only for exclusion-reason
//! telemetry (not control flow).
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::collaborators::{BundleDataClient, ConfigStoreClient, HubPoolClient};
use crate::error::RelayerError;
use crate::fixed_point::{convert_decimals, fraction, mul_frac, FIXED_POINT};
use crate::inventory::balance::{L2TokenRoute, VirtualBalanceAccountant};
use crate::types::{Address, ChainId, Deposit};
use alloy::primitives::U256;
use anyhow::Result;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Per-candidate-chain allocation policy and routing metadata needed by the
/// selector. Assembled by the caller from `TokenBalanceConfig` plus chain
/// metadata (§3.1 `ChainConfig`).
#[derive(Debug, Clone)]
pub struct ChainAllocationConfig {
    pub target_pct: U256,
    pub threshold_pct: U256,
    pub target_overage_buffer: U256,
    pub is_slow_withdrawal_chain: bool,
    pub has_fast_ramp: bool,
}

/// Everything the selector needs for one deposit beyond the deposit itself.
pub struct SelectionContext {
    pub l1_decimals: u8,
    pub inventory_management_enabled: bool,
    pub prioritize_slow_withdrawal_chains: bool,
    /// L2 routes backing the L1 token per chain; absence means the token is
    /// not enabled on that chain.
    pub chain_routes: HashMap<ChainId, Vec<L2TokenRoute>>,
    pub chain_allocation: HashMap<ChainId, ChainAllocationConfig>,
}

pub struct RepaymentChainSelector {
    hub_pool: Arc<dyn HubPoolClient>,
    config_store: Arc<dyn ConfigStoreClient>,
    bundle_data: Arc<dyn BundleDataClient>,
    accountant: VirtualBalanceAccountant,
    hub_chain_id: ChainId,
    /// One shared future per L1 token per tick; cleared by
    /// [`RepaymentChainSelector::clear_tick_memo`] so a new tick re-fetches.
    refund_memo: DashMap<String, Arc<OnceCell<HashMap<ChainId, U256>>>>,
    /// One shared future per L1 token per tick, covering every
    /// slow-withdrawal chain's excess-running-balance inputs at once.
    excess_balance_memo: DashMap<String, Arc<OnceCell<HashMap<ChainId, (U256, U256)>>>>,
}

impl RepaymentChainSelector {
    pub fn new(
        hub_pool: Arc<dyn HubPoolClient>,
        config_store: Arc<dyn ConfigStoreClient>,
        bundle_data: Arc<dyn BundleDataClient>,
        accountant: VirtualBalanceAccountant,
        hub_chain_id: ChainId,
    ) -> Self {
        Self {
            hub_pool,
            config_store,
            bundle_data,
            accountant,
            hub_chain_id,
            refund_memo: DashMap::new(),
            excess_balance_memo: DashMap::new(),
        }
    }

    /// Drops every memoized per-tick future. Called once at the start of
    /// each tick (see [`crate::inventory::InventoryManager::update`]) so a
    /// new tick never reads a stale in-flight result from the last one.
    pub fn clear_tick_memo(&self) {
        self.refund_memo.clear();
        self.excess_balance_memo.clear();
    }

    /// Full §4.6 algorithm given an assembled [`SelectionContext`].
    pub async fn select_with_context(
        &self,
        deposit: &Deposit,
        l1_token: &Address,
        ctx: &SelectionContext,
    ) -> Result<Vec<ChainId>> {
        let destination_valid = ctx.chain_routes.contains_key(&deposit.destination);

        if !ctx.inventory_management_enabled {
            return Ok(if destination_valid {
                vec![deposit.destination]
            } else {
                vec![deposit.origin]
            });
        }

        let equivalent = self
            .hub_pool
            .are_tokens_equivalent(&deposit.input_token, deposit.origin, &deposit.output_token, deposit.destination)
            .await?;
        if !equivalent {
            return Err(RelayerError::Configuration(format!(
                "input/output token mismatch for deposit {}",
                deposit.deposit_id
            ))
            .into());
        }

        let origin_is_fast = deposit.origin == self.hub_chain_id
            || ctx
                .chain_allocation
                .get(&deposit.origin)
                .map(|c| c.has_fast_ramp)
                .unwrap_or(false);

        if deposit.from_lite_chain && origin_is_fast {
            return Ok(vec![deposit.origin]);
        }

        let mut candidates: Vec<ChainId> = Vec::new();

        if ctx.prioritize_slow_withdrawal_chains && !deposit.from_lite_chain {
            let slow_chain_ids: Vec<ChainId> = ctx
                .chain_allocation
                .iter()
                .filter(|(_, alloc)| alloc.is_slow_withdrawal_chain)
                .map(|(&chain_id, _)| chain_id)
                .collect();

            let components = self.get_excess_running_balance_components(l1_token, &slow_chain_ids).await;
            let input_l1 = convert_decimals(18, ctx.l1_decimals, deposit.input_amount);

            let mut slow_chains: Vec<(ChainId, U256)> = Vec::new();
            for &chain_id in &slow_chain_ids {
                let (excess, target) = components.get(&chain_id).copied().unwrap_or_default();
                let pct = excess_running_balance_pct_from_components(excess, target, input_l1);
                if pct > U256::ZERO {
                    slow_chains.push((chain_id, pct));
                }
            }
            slow_chains.sort_by(|a, b| b.1.cmp(&a.1));
            candidates.extend(slow_chains.into_iter().map(|(c, _)| c));
        }

        if deposit.to_lite_chain {
            push_unique(&mut candidates, deposit.origin);
        }

        if destination_valid {
            push_unique(&mut candidates, deposit.destination);
        }

        if ctx.chain_routes.contains_key(&deposit.origin) && deposit.origin != self.hub_chain_id {
            push_unique(&mut candidates, deposit.origin);
        }

        let cumulative_balance = self
            .accountant
            .cumulative_balance(l1_token, ctx.l1_decimals, &ctx.chain_routes)
            .await?;

        let total_refunds = self.get_bundle_refunds(l1_token).await;
        let refund_sum: U256 = total_refunds.values().fold(U256::ZERO, |acc, v| acc + *v);
        let denom = cumulative_balance.saturating_add(refund_sum);

        let input_l1 = convert_decimals(18, ctx.l1_decimals, deposit.input_amount);
        let same_token_both_sides = deposit.input_token == deposit.output_token;

        let mut eligible = Vec::new();
        for chain_id in candidates {
            let Some(routes) = ctx.chain_routes.get(&chain_id) else {
                continue;
            };
            let Some(alloc) = ctx.chain_allocation.get(&chain_id) else {
                continue;
            };

            let effective = self
                .accountant
                .effective_balance(chain_id, l1_token, ctx.l1_decimals, routes)
                .await?;
            let shortfall = self.accountant.shortfall(chain_id, ctx.l1_decimals, routes).await?;
            let relay_adjustment = if chain_id == deposit.destination && same_token_both_sides {
                U256::ZERO
            } else {
                input_l1
            };
            let upcoming = *total_refunds.get(&chain_id).unwrap_or(&U256::ZERO);

            let numer = effective.saturating_sub(shortfall).saturating_add(relay_adjustment).saturating_add(upcoming);
            let expected_alloc = fraction(numer, denom);

            let effective_target = if deposit.to_lite_chain && chain_id == deposit.destination {
                alloc.target_pct
            } else {
                mul_frac(alloc.target_pct, alloc.target_overage_buffer, FIXED_POINT)
            };

            if expected_alloc <= effective_target {
                eligible.push(chain_id);
            } else {
                debug!(chain_id, %expected_alloc, %effective_target, "excluding repayment candidate: would overshoot target");
            }
        }

        if deposit.from_lite_chain {
            return Ok(if eligible == vec![deposit.origin] {
                eligible
            } else {
                Vec::new()
            });
        }

        if !eligible.contains(&self.hub_chain_id) {
            eligible.push(self.hub_chain_id);
        }

        Ok(eligible)
    }

    /// Memoized (excess, target) pair per slow-withdrawal chain, shared by
    /// every deposit routed through this tick: the on-chain reads behind it
    /// (`get_latest_executed_root_bundle_end_block`, `get_running_balance_before_block`,
    /// `get_upcoming_deposit_amount`, `get_next_bundle_refunds`,
    /// `get_spoke_target_balance`) do not depend on the deposit being
    /// evaluated, only on `l1_token` and `chain_id`.
    async fn get_excess_running_balance_components(
        &self,
        l1_token: &Address,
        slow_chains: &[ChainId],
    ) -> HashMap<ChainId, (U256, U256)> {
        let key = l1_token.to_native();
        let cell = self
            .excess_balance_memo
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            let mut components = HashMap::new();
            for &chain_id in slow_chains {
                let pair = self.excess_running_balance_components(l1_token, chain_id).await.unwrap_or_default();
                components.insert(chain_id, pair);
            }
            components
        })
        .await
        .clone()
    }

    /// §4.6.1 excess running balance, before subtracting the deposit's own
    /// refund amount, plus the chain's target balance.
    async fn excess_running_balance_components(&self, l1_token: &Address, chain_id: ChainId) -> Result<(U256, U256)> {
        let end_block = self
            .hub_pool
            .get_latest_executed_root_bundle_end_block(l1_token, chain_id)
            .await?;
        let running_balance = self
            .hub_pool
            .get_running_balance_before_block(l1_token, chain_id, end_block)
            .await?;
        let deposits_since = self
            .bundle_data
            .get_upcoming_deposit_amount(l1_token, chain_id, end_block)
            .await?;
        let upcoming_refunds = self.bundle_data.get_next_bundle_refunds(l1_token, chain_id).await?;

        let plus = running_balance.saturating_add(upcoming_refunds);
        let excess = if deposits_since > plus { deposits_since - plus } else { U256::ZERO };
        let target = self.config_store.get_spoke_target_balance(l1_token, chain_id).await?;

        Ok((excess, target))
    }

    /// Memoized per (l1_token -> chain -> refund total) total refund lookup,
    /// shared by every deposit routed through this tick.
    async fn get_bundle_refunds(&self, l1_token: &Address) -> HashMap<ChainId, U256> {
        let key = l1_token.to_native();
        let cell = self.refund_memo.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone();

        cell.get_or_init(|| async { self.bundle_data.get_total_refund(l1_token).await.unwrap_or_default() })
            .await
            .clone()
    }
}

/// §4.6.1 excess running balance percentage: combines the memoized
/// per-chain (excess, target) pair with the deposit-specific refund amount.
fn excess_running_balance_pct_from_components(excess: U256, target: U256, refund_amount: U256) -> U256 {
    let post_excess = excess.saturating_sub(refund_amount);

    if target.is_zero() {
        if post_excess > target {
            U256::MAX
        } else {
            U256::ZERO
        }
    } else if target >= post_excess {
        U256::ZERO
    } else {
        mul_frac(post_excess - target, FIXED_POINT, target)
    }
}

fn push_unique(list: &mut Vec<ChainId>, chain_id: ChainId) {
    if !list.contains(&chain_id) {
        list.push(chain_id);
    }
}
