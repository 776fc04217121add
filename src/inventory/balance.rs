//! Virtual Balance Accountant: per-chain and cumulative effective balances,
//! combining on-chain balance, pending inbound transfers, and shortfalls,
//! all normalized into one token's decimals.
//!
//! Grounded on `pool::state::PoolStateManager`'s `Arc<..>`-handle /
//! manual-`Clone` shape, generalized from a DEX pool cache to a per-chain
//! balance accountant.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::collaborators::{CrossChainTransferClient, TokenBalanceClient};
use crate::fixed_point::{convert_decimals, fraction};
use crate::types::{Address, ChainId};
use alloy::primitives::U256;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// An L2 token that backs an L1 token on a given chain, with its own
/// decimal precision.
#[derive(Debug, Clone)]
pub struct L2TokenRoute {
    pub l2_token: Address,
    pub decimals: u8,
}

#[derive(Clone)]
pub struct VirtualBalanceAccountant {
    token_balances: Arc<dyn TokenBalanceClient>,
    transfers: Arc<dyn CrossChainTransferClient>,
    enabled_chains: Vec<ChainId>,
    relayer: Address,
}

impl VirtualBalanceAccountant {
    pub fn new(
        token_balances: Arc<dyn TokenBalanceClient>,
        transfers: Arc<dyn CrossChainTransferClient>,
        enabled_chains: Vec<ChainId>,
    ) -> Self {
        Self {
            token_balances,
            transfers,
            enabled_chains,
            relayer: Address::Evm(alloy::primitives::Address::ZERO),
        }
    }

    pub fn with_relayer(mut self, relayer: Address) -> Self {
        self.relayer = relayer;
        self
    }

    pub fn enabled_chains(&self) -> &[ChainId] {
        &self.enabled_chains
    }

    /// Effective balance of `l1_token` on `chain_id`: the sum, over every
    /// L2 route backing it on that chain, of on-chain balance (converted to
    /// `l1_decimals`) plus pending inbound transfers.
    pub async fn effective_balance(
        &self,
        chain_id: ChainId,
        l1_token: &Address,
        l1_decimals: u8,
        routes: &[L2TokenRoute],
    ) -> Result<U256> {
        let mut total = U256::ZERO;
        for route in routes {
            let balance = self.token_balances.get_balance(chain_id, &route.l2_token).await?;
            total += convert_decimals(route.decimals, l1_decimals, balance);

            let pending = self
                .transfers
                .get_outstanding_transfer_amount(&self.relayer, chain_id, l1_token, Some(&route.l2_token))
                .await?;
            total += convert_decimals(route.decimals, l1_decimals, pending);
        }
        Ok(total)
    }

    /// Sum of shortfalls across every L2 route backing `l1_token` on
    /// `chain_id`, normalized to `l1_decimals`.
    pub async fn shortfall(
        &self,
        chain_id: ChainId,
        l1_decimals: u8,
        routes: &[L2TokenRoute],
    ) -> Result<U256> {
        let mut total = U256::ZERO;
        for route in routes {
            let shortfall = self.token_balances.get_shortfall(chain_id, &route.l2_token).await?;
            total += convert_decimals(route.decimals, l1_decimals, shortfall);
        }
        Ok(total)
    }

    /// Cumulative balance across every enabled chain.
    pub async fn cumulative_balance(
        &self,
        l1_token: &Address,
        l1_decimals: u8,
        chain_routes: &HashMap<ChainId, Vec<L2TokenRoute>>,
    ) -> Result<U256> {
        let mut total = U256::ZERO;
        for &chain_id in &self.enabled_chains {
            let Some(routes) = chain_routes.get(&chain_id) else {
                continue;
            };
            total += self.effective_balance(chain_id, l1_token, l1_decimals, routes).await?;
        }
        Ok(total)
    }

    /// Current allocation fraction of `l1_token` on `chain_id`, accounting
    /// for shortfall. Zero when cumulative balance is zero.
    pub async fn current_allocation_pct(
        &self,
        chain_id: ChainId,
        l1_token: &Address,
        l1_decimals: u8,
        routes: &[L2TokenRoute],
        cumulative_balance: U256,
    ) -> Result<U256> {
        let effective = self.effective_balance(chain_id, l1_token, l1_decimals, routes).await?;
        let shortfall = self.shortfall(chain_id, l1_decimals, routes).await?;
        let adjusted = effective.saturating_sub(shortfall);
        Ok(fraction(adjusted, cumulative_balance))
    }

    /// §4.5 distribution snapshot across a set of L1 tokens:
    /// `l1_token -> chain_id -> l2_token -> allocation fraction`. A token
    /// whose cumulative balance is zero contributes no entry at all (an
    /// empty distribution, not an error).
    pub async fn token_distribution_per_l1_token(
        &self,
        tokens: &[(Address, u8, HashMap<ChainId, Vec<L2TokenRoute>>)],
    ) -> Result<HashMap<Address, HashMap<ChainId, HashMap<Address, U256>>>> {
        let mut distribution = HashMap::new();
        for (l1_token, l1_decimals, chain_routes) in tokens {
            let per_chain = self.distribution_for_token(l1_token, *l1_decimals, chain_routes).await?;
            if !per_chain.is_empty() {
                distribution.insert(l1_token.clone(), per_chain);
            }
        }
        Ok(distribution)
    }

    async fn distribution_for_token(
        &self,
        l1_token: &Address,
        l1_decimals: u8,
        chain_routes: &HashMap<ChainId, Vec<L2TokenRoute>>,
    ) -> Result<HashMap<ChainId, HashMap<Address, U256>>> {
        let cumulative = self.cumulative_balance(l1_token, l1_decimals, chain_routes).await?;
        if cumulative.is_zero() {
            return Ok(HashMap::new());
        }

        let mut per_chain = HashMap::new();
        for &chain_id in &self.enabled_chains {
            let Some(routes) = chain_routes.get(&chain_id) else {
                continue;
            };
            let mut per_l2 = HashMap::new();
            for route in routes {
                let balance = self.token_balances.get_balance(chain_id, &route.l2_token).await?;
                let pending = self
                    .transfers
                    .get_outstanding_transfer_amount(&self.relayer, chain_id, l1_token, Some(&route.l2_token))
                    .await?;
                let route_balance = convert_decimals(route.decimals, l1_decimals, balance)
                    + convert_decimals(route.decimals, l1_decimals, pending);
                per_l2.insert(route.l2_token.clone(), fraction(route_balance, cumulative));
            }
            if !per_l2.is_empty() {
                per_chain.insert(chain_id, per_l2);
            }
        }
        Ok(per_chain)
    }
}
