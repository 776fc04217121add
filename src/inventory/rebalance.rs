//! Rebalance Planner: L1->L2 budget-constrained rebalances, L2 native-token
//! unwraps, and L2->L1 rate-limited excess withdrawals.
//!
//! Grounded on `arbitrage::executor`'s sequential, nonce-respecting
//! submission loop and `arbitrage::cooldown::RouteCooldown`'s
//! rate-limit/backoff bookkeeping, reused here for the excess-withdrawal
//! rate limit window.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::collaborators::{AdapterManager, TokenBalanceClient};
use crate::fixed_point::{fraction, mul_frac, FIXED_POINT};
use crate::inventory::balance::{L2TokenRoute, VirtualBalanceAccountant};
use crate::types::{Address, ChainId, Rebalance, TokenBalanceConfig};
use alloy::primitives::U256;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct RebalancePlanner {
    accountant: VirtualBalanceAccountant,
    adapters: Arc<dyn AdapterManager>,
    token_balances: Arc<dyn TokenBalanceClient>,
    enabled_chains: Vec<ChainId>,
    hub_chain_id: ChainId,
}

/// Per-chain configuration plus the L2 route(s) that back `l1_token` there.
pub struct ChainTokenEntry {
    pub chain_id: ChainId,
    pub routes: Vec<L2TokenRoute>,
    pub config: TokenBalanceConfig,
}

impl RebalancePlanner {
    pub fn new(
        accountant: VirtualBalanceAccountant,
        adapters: Arc<dyn AdapterManager>,
        token_balances: Arc<dyn TokenBalanceClient>,
        enabled_chains: Vec<ChainId>,
        hub_chain_id: ChainId,
    ) -> Self {
        Self { accountant, adapters, token_balances, enabled_chains, hub_chain_id }
    }

    /// §4.7 L1->L2 rebalance planning. `hub_l1_balance` is the hub chain's
    /// current balance of `l1_token`, used as the per-pass budget; it is
    /// decremented eagerly as plans are prepared so later entries in the
    /// same pass see the reservation.
    pub async fn plan_l1_to_l2_for(
        &self,
        l1_token: &Address,
        l1_decimals: u8,
        entries: &[ChainTokenEntry],
        mut hub_l1_balance: U256,
    ) -> Result<Vec<Rebalance>> {
        let chain_routes: HashMap<ChainId, Vec<L2TokenRoute>> =
            entries.iter().map(|e| (e.chain_id, e.routes.clone())).collect();
        let cumulative_balance = self.accountant.cumulative_balance(l1_token, l1_decimals, &chain_routes).await?;

        let mut plans = Vec::new();
        for entry in entries {
            if !self.enabled_chains.contains(&entry.chain_id) {
                continue;
            }
            let Some(routes) = chain_routes.get(&entry.chain_id) else {
                return Err(anyhow!("missing L2 token info for chain {}", entry.chain_id));
            };

            let current_pct = self
                .accountant
                .current_allocation_pct(entry.chain_id, l1_token, l1_decimals, routes, cumulative_balance)
                .await?;

            if current_pct >= entry.config.threshold_pct {
                continue;
            }

            let amount = mul_frac(
                entry.config.target_pct.saturating_sub(current_pct),
                cumulative_balance,
                FIXED_POINT,
            );

            if amount.is_zero() || amount > hub_l1_balance {
                info!(chain_id = entry.chain_id, %amount, %hub_l1_balance, "skipping rebalance: insufficient hub L1 balance this pass");
                continue;
            }

            let balance = self.token_balances.get_balance(entry.chain_id, &routes[0].l2_token).await.unwrap_or_default();

            plans.push(Rebalance {
                chain_id: entry.chain_id,
                l1_token: l1_token.clone(),
                l2_token: routes[0].l2_token.clone(),
                current_alloc_pct: current_pct,
                target_pct: entry.config.target_pct,
                threshold_pct: entry.config.threshold_pct,
                balance,
                cumulative_balance,
                amount,
            });

            hub_l1_balance -= amount;
            self.token_balances.decrement_local_balance(entry.chain_id, l1_token, amount);
        }

        Ok(plans)
    }

    /// Executes planned transfers strictly sequentially: a shared signing
    /// nonce and a shared L1 balance make concurrent submission unsafe. Before
    /// each submission the hub's on-chain L1 balance is re-read and checked
    /// against what this pass has already committed to spend; if the chain
    /// has drifted below what the plan needs (another process spent from the
    /// same balance between planning and execution) the plan is skipped with
    /// a warning rather than submitted against insufficient funds.
    pub async fn execute(&self, plans: &[Rebalance]) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(plans.len());
        let mut committed: HashMap<Address, U256> = HashMap::new();

        for plan in plans {
            let onchain_balance = match self.token_balances.get_balance(self.hub_chain_id, &plan.l1_token).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(chain_id = plan.chain_id, error = %e, "failed to re-verify hub L1 balance, skipping rebalance");
                    results.push(Err(e));
                    continue;
                }
            };

            let already_committed = committed.get(&plan.l1_token).copied().unwrap_or_default();
            let available = onchain_balance.saturating_sub(already_committed);
            if available < plan.amount {
                warn!(
                    chain_id = plan.chain_id,
                    %available,
                    amount = %plan.amount,
                    "hub L1 balance drifted below planned amount, skipping rebalance"
                );
                results.push(Err(anyhow!(
                    "L1 balance drift: {available} available but {} required for chain {}",
                    plan.amount,
                    plan.chain_id
                )));
                continue;
            }

            if let Err(e) = self.adapters.set_l1_token_approvals(&plan.l1_token, plan.chain_id).await {
                warn!(chain_id = plan.chain_id, error = %e, "failed to set L1 token approvals, skipping rebalance");
                results.push(Err(e));
                continue;
            }

            let result = self
                .adapters
                .send_token_cross_chain(&plan.l1_token, &plan.l2_token, plan.chain_id, plan.amount)
                .await;
            match &result {
                Ok(()) => {
                    *committed.entry(plan.l1_token.clone()).or_default() += plan.amount;
                }
                Err(e) => {
                    warn!(chain_id = plan.chain_id, error = %e, "rebalance execution failed, continuing with remaining plans");
                }
            }
            results.push(result);
        }
        results
    }

    /// §4.7 L2 native-token unwrap: tops up the chain's native gas balance
    /// from its wrapped-native holdings when it drops below threshold.
    pub async fn plan_native_unwrap(
        &self,
        chain_id: ChainId,
        native_balance: U256,
        threshold: U256,
        target: U256,
    ) -> Result<()> {
        if native_balance >= threshold {
            return Ok(());
        }
        self.adapters
            .wrap_native_if_above_threshold(chain_id, threshold, target)
            .await
    }

    /// §4.7 L2->L1 excess withdrawal with rate limiting. When a withdrawal is
    /// warranted and under the rate-limit cap, submits it through the
    /// adapter manager and returns the withdrawn amount; returns `None` if
    /// nothing should be withdrawn this pass (either below threshold or
    /// rate-limited).
    pub async fn plan_excess_withdrawal(
        &self,
        l1_token: &Address,
        l2_token: &Address,
        chain_id: ChainId,
        current_pct: U256,
        cumulative_balance_l2_decimals: U256,
        config: &TokenBalanceConfig,
    ) -> Result<Option<U256>> {
        let Some(period) = config.withdraw_excess_period else {
            return Ok(None);
        };

        let overage = mul_frac(config.target_pct, config.target_overage_buffer, FIXED_POINT);
        let discount = U256::from(950_000_000_000_000_000u128); // 0.95x
        let excess_withdraw_threshold_pct = mul_frac(overage, discount, FIXED_POINT);

        if current_pct < excess_withdraw_threshold_pct {
            return Ok(None);
        }

        let withdraw_pct = current_pct.saturating_sub(config.target_pct);
        let withdraw_amount = mul_frac(cumulative_balance_l2_decimals, withdraw_pct, FIXED_POINT);

        // The same cap backs both the decision and the log line: no second,
        // differently derived threshold.
        let max_l2_withdrawal_volume = mul_frac(
            excess_withdraw_threshold_pct.saturating_sub(config.target_pct),
            cumulative_balance_l2_decimals,
            FIXED_POINT,
        );

        let pending = self.adapters.get_l2_pending_withdrawal_amount(l2_token, chain_id, period).await?;

        if pending >= max_l2_withdrawal_volume {
            info!(chain_id, %pending, %max_l2_withdrawal_volume, "excess withdrawal rate-limited this period");
            return Ok(None);
        }

        self.adapters.withdraw_token_from_l2(l1_token, l2_token, chain_id, withdraw_amount).await?;
        Ok(Some(withdraw_amount))
    }
}

/// Standalone helper so callers (and tests) can compute a per-chain
/// allocation fraction without constructing a full planner.
pub fn allocation_fraction(balance: U256, cumulative: U256) -> U256 {
    fraction(balance, cumulative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CrossChainTransferClient;
    use alloy::primitives::Address as EvmAddress;
    use async_trait::async_trait;
    use dashmap::DashMap;

    struct FixedBalances(DashMap<(ChainId, String), U256>);
    #[async_trait]
    impl TokenBalanceClient for FixedBalances {
        async fn get_balance(&self, chain_id: ChainId, token: &Address) -> Result<U256> {
            Ok(self.0.get(&(chain_id, token.to_native())).map(|v| *v).unwrap_or_default())
        }
        async fn get_shortfall(&self, _chain_id: ChainId, _token: &Address) -> Result<U256> {
            Ok(U256::ZERO)
        }
        fn decrement_local_balance(&self, _chain_id: ChainId, _token: &Address, _amount: U256) {}
    }

    struct NoTransfers;
    #[async_trait]
    impl CrossChainTransferClient for NoTransfers {
        async fn get_outstanding_transfer_amount(&self, _relayer: &Address, _chain_id: ChainId, _l1_token: &Address, _l2_token: Option<&Address>) -> Result<U256> {
            Ok(U256::ZERO)
        }
        fn record_outstanding_transfer(&self, _chain_id: ChainId, _l1_token: &Address, _l2_token: &Address, _amount: U256) {}
    }

    struct NoopAdapters {
        pending: U256,
    }
    #[async_trait]
    impl AdapterManager for NoopAdapters {
        async fn send_token_cross_chain(&self, _l1_token: &Address, _l2_token: &Address, _chain_id: ChainId, _amount: U256) -> Result<()> {
            Ok(())
        }
        async fn withdraw_token_from_l2(&self, _l1_token: &Address, _l2_token: &Address, _chain_id: ChainId, _amount: U256) -> Result<()> {
            Ok(())
        }
        async fn get_l2_pending_withdrawal_amount(&self, _l2_token: &Address, _chain_id: ChainId, _period_seconds: u64) -> Result<U256> {
            Ok(self.pending)
        }
        async fn wrap_native_if_above_threshold(&self, _chain_id: ChainId, _threshold: U256, _target: U256) -> Result<()> {
            Ok(())
        }
        async fn set_l1_token_approvals(&self, _l1_token: &Address, _chain_id: ChainId) -> Result<()> {
            Ok(())
        }
    }

    fn token(byte: u8) -> Address {
        Address::Evm(EvmAddress::with_last_byte(byte))
    }

    const HUB_CHAIN_ID: ChainId = 1;

    fn planner(pending: U256) -> RebalancePlanner {
        planner_with_hub_balances(pending, DashMap::new())
    }

    fn planner_with_hub_balances(pending: U256, hub_balances: DashMap<(ChainId, String), U256>) -> RebalancePlanner {
        let accountant = VirtualBalanceAccountant::new(Arc::new(FixedBalances(DashMap::new())), Arc::new(NoTransfers), vec![10]);
        RebalancePlanner::new(
            accountant,
            Arc::new(NoopAdapters { pending }),
            Arc::new(FixedBalances(hub_balances)),
            vec![10],
            HUB_CHAIN_ID,
        )
    }

    #[tokio::test]
    async fn excess_withdrawal_blocked_below_threshold() {
        let planner = planner(U256::ZERO);
        let config = TokenBalanceConfig {
            target_pct: FIXED_POINT / U256::from(10u64),
            threshold_pct: U256::ZERO,
            target_overage_buffer: crate::types::default_overage_buffer(),
            unwrap_weth_threshold: None,
            unwrap_weth_target: None,
            withdraw_excess_period: Some(3600),
        };
        let result = planner
            .plan_excess_withdrawal(&token(1), &token(2), 10, U256::ZERO, U256::from(1000u64), &config)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn excess_withdrawal_rate_limited_when_pending_at_cap() {
        let config = TokenBalanceConfig {
            target_pct: FIXED_POINT / U256::from(10u64), // 10%
            threshold_pct: U256::ZERO,
            target_overage_buffer: crate::types::default_overage_buffer(), // 1.5x
            unwrap_weth_threshold: None,
            unwrap_weth_target: None,
            withdraw_excess_period: Some(3600),
        };
        // overage = 15%, discount 0.95 -> threshold = 14.25%
        let threshold = mul_frac(
            mul_frac(config.target_pct, config.target_overage_buffer, FIXED_POINT),
            U256::from(950_000_000_000_000_000u128),
            FIXED_POINT,
        );
        let cumulative = U256::from(1_000_000u64);
        let max_volume = mul_frac(threshold.saturating_sub(config.target_pct), cumulative, FIXED_POINT);

        let planner = planner(max_volume); // pending == cap, should block
        let result = planner
            .plan_excess_withdrawal(&token(1), &token(2), 10, threshold, cumulative, &config)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn excess_withdrawal_allowed_when_above_threshold_and_under_cap() {
        let config = TokenBalanceConfig {
            target_pct: FIXED_POINT / U256::from(10u64),
            threshold_pct: U256::ZERO,
            target_overage_buffer: crate::types::default_overage_buffer(),
            unwrap_weth_threshold: None,
            unwrap_weth_target: None,
            withdraw_excess_period: Some(3600),
        };
        let threshold = mul_frac(
            mul_frac(config.target_pct, config.target_overage_buffer, FIXED_POINT),
            U256::from(950_000_000_000_000_000u128),
            FIXED_POINT,
        );
        let planner = planner(U256::ZERO);
        let result = planner
            .plan_excess_withdrawal(&token(1), &token(2), 10, threshold, U256::from(1_000_000u64), &config)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn execute_skips_plan_when_hub_balance_has_drifted_below_amount() {
        let hub_balances = DashMap::new();
        hub_balances.insert((HUB_CHAIN_ID, token(1).to_native()), U256::from(5u64));
        let planner = planner_with_hub_balances(U256::ZERO, hub_balances);

        let plan = Rebalance {
            chain_id: 10,
            l1_token: token(1),
            l2_token: token(2),
            current_alloc_pct: U256::ZERO,
            target_pct: U256::ZERO,
            threshold_pct: U256::ZERO,
            balance: U256::ZERO,
            cumulative_balance: U256::ZERO,
            amount: U256::from(10u64), // more than the 5 actually on-chain
        };

        let results = planner.execute(&[plan]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn execute_submits_when_hub_balance_covers_amount() {
        let hub_balances = DashMap::new();
        hub_balances.insert((HUB_CHAIN_ID, token(1).to_native()), U256::from(100u64));
        let planner = planner_with_hub_balances(U256::ZERO, hub_balances);

        let plan = Rebalance {
            chain_id: 10,
            l1_token: token(1),
            l2_token: token(2),
            current_alloc_pct: U256::ZERO,
            target_pct: U256::ZERO,
            threshold_pct: U256::ZERO,
            balance: U256::ZERO,
            cumulative_balance: U256::ZERO,
            amount: U256::from(10u64),
        };

        let results = planner.execute(&[plan]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }
}
