//! Per-chain simulated gas cost for filling a deposit.
//!
//! Grounded on `arbitrage::multicall_quoter::MulticallQuoter` (config
//! validation via `ok_or_else(|| anyhow!(...))`, batched simulation) and
//! `pool::v2_syncer`'s `futures::future::join_all` parallel-fan-out with
//! per-item fallback, used here to populate the messageless-fill cache for
//! every enabled chain in one `update()` pass.
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::collaborators::GasSimulationFeed;
use crate::fixed_point::{mul_frac, FIXED_POINT};
use crate::types::{Address, ChainId};
use alloy::primitives::U256;
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Simulated cost of filling a deposit on its destination chain, already
/// scaled by `gas_padding` and (for the token leg) `gas_multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasCost {
    pub native_gas_cost: U256,
    pub token_gas_cost: U256,
    pub gas_price: U256,
}

impl GasCost {
    /// Sentinel returned when simulation fails; callers treat this as
    /// "unprofitable, cost unknown" rather than propagating an error.
    pub fn unknown() -> Self {
        Self {
            native_gas_cost: U256::MAX,
            token_gas_cost: U256::MAX,
            gas_price: U256::MAX,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.native_gas_cost == U256::MAX
    }
}

#[derive(Clone)]
pub struct GasCostEstimator {
    feed: Arc<dyn GasSimulationFeed>,
    /// Messageless-fill cache, one entry per destination chain.
    cache: Arc<DashMap<ChainId, GasCost>>,
    relayer: Address,
    gas_padding: U256,
    gas_multiplier: U256,
    message_gas_multiplier: U256,
}

impl GasCostEstimator {
    /// `gas_padding` and `gas_multiplier` are 18-decimal fixed-point
    /// multipliers. Padding is constrained to [1.0, 3.0]; the multiplier to
    /// [0, 4.0], matching the spec's configuration invariant.
    pub fn new(
        feed: Arc<dyn GasSimulationFeed>,
        relayer: Address,
        gas_padding: U256,
        gas_multiplier: U256,
        message_gas_multiplier: U256,
    ) -> Result<Self> {
        let one = FIXED_POINT;
        let three = FIXED_POINT.saturating_mul(U256::from(3u8));
        let four = FIXED_POINT.saturating_mul(U256::from(4u8));

        if gas_padding < one || gas_padding > three {
            return Err(anyhow!("gas_padding {gas_padding} out of range [1.0, 3.0]"));
        }
        if gas_multiplier > four {
            return Err(anyhow!("gas_multiplier {gas_multiplier} out of range [0, 4.0]"));
        }
        if message_gas_multiplier > four {
            return Err(anyhow!(
                "message_gas_multiplier {message_gas_multiplier} out of range [0, 4.0]"
            ));
        }

        Ok(Self {
            feed,
            cache: Arc::new(DashMap::new()),
            relayer,
            gas_padding,
            gas_multiplier,
            message_gas_multiplier,
        })
    }

    /// Populates the messageless-fill cache for every enabled chain,
    /// fanning out concurrently and falling back to the previous cached
    /// value (if any) for chains whose simulation fails this tick.
    pub async fn refresh_messageless_cache(
        &self,
        chains: &[ChainId],
        template_output_token: impl Fn(ChainId) -> Address,
        template_amount: U256,
    ) {
        let tasks: Vec<_> = chains
            .iter()
            .map(|&chain_id| {
                let feed = Arc::clone(&self.feed);
                let relayer = self.relayer.clone();
                let output_token = template_output_token(chain_id);
                async move {
                    let result = feed
                        .simulate_fill(chain_id, &relayer, &output_token, template_amount, false)
                        .await;
                    (chain_id, result)
                }
            })
            .collect();

        for (chain_id, result) in join_all(tasks).await {
            match result {
                Ok((native, token, gas_price)) => {
                    self.cache.insert(
                        chain_id,
                        GasCost {
                            native_gas_cost: native,
                            token_gas_cost: token,
                            gas_price,
                        },
                    );
                }
                Err(e) => {
                    warn!(chain_id, error = %e, "gas simulation failed; using sentinel or stale cache");
                    self.cache.entry(chain_id).or_insert_with(GasCost::unknown);
                }
            }
        }
    }

    /// Total gas cost for filling `deposit`, post-padding and
    /// post-multiplier. Messageless deposits use the per-chain cache;
    /// message-carrying deposits are simulated individually since the
    /// message can execute arbitrary code.
    pub async fn total_gas_cost(
        &self,
        chain_id: ChainId,
        output_token: &Address,
        amount: U256,
        has_message: bool,
    ) -> GasCost {
        let raw = if has_message {
            match self
                .feed
                .simulate_fill(chain_id, &self.relayer, output_token, amount, true)
                .await
            {
                Ok((native, token, gas_price)) => GasCost {
                    native_gas_cost: native,
                    token_gas_cost: token,
                    gas_price,
                },
                Err(e) => {
                    warn!(chain_id, error = %e, "message-fill gas simulation failed");
                    GasCost::unknown()
                }
            }
        } else {
            self.cache.get(&chain_id).map(|v| *v).unwrap_or_else(GasCost::unknown)
        };

        if raw.is_unknown() {
            return raw;
        }

        let multiplier = if has_message {
            self.message_gas_multiplier
        } else {
            self.gas_multiplier
        };

        GasCost {
            native_gas_cost: mul_frac(raw.native_gas_cost, self.gas_padding, FIXED_POINT),
            token_gas_cost: mul_frac(
                mul_frac(raw.token_gas_cost, self.gas_padding, FIXED_POINT),
                multiplier,
                FIXED_POINT,
            ),
            gas_price: raw.gas_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address as EvmAddress;
    use async_trait::async_trait;

    struct FixedFeed {
        native: U256,
        token: U256,
        gas_price: U256,
        fail: bool,
    }

    #[async_trait]
    impl GasSimulationFeed for FixedFeed {
        async fn simulate_fill(
            &self,
            _chain_id: ChainId,
            _relayer: &Address,
            _output_token: &Address,
            _amount: U256,
            _has_message: bool,
        ) -> Result<(U256, U256, U256)> {
            if self.fail {
                anyhow::bail!("simulation reverted")
            }
            Ok((self.native, self.token, self.gas_price))
        }
    }

    fn relayer() -> Address {
        Address::Evm(EvmAddress::with_last_byte(9))
    }

    #[test]
    fn rejects_out_of_range_padding() {
        let feed = Arc::new(FixedFeed {
            native: U256::from(1u64),
            token: U256::from(1u64),
            gas_price: U256::from(1u64),
            fail: false,
        });
        let result = GasCostEstimator::new(
            feed,
            relayer(),
            FIXED_POINT / U256::from(2u64), // 0.5x, below minimum
            FIXED_POINT,
            FIXED_POINT,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn applies_padding_to_native_and_multiplier_only_to_token() {
        let feed = Arc::new(FixedFeed {
            native: U256::from(100_000u64),
            token: U256::from(1_000_000u64),
            gas_price: U256::from(50u64),
            fail: false,
        });
        let padding = FIXED_POINT.saturating_mul(U256::from(2u8)); // 2x
        let multiplier = FIXED_POINT.saturating_mul(U256::from(3u8)); // 3x
        let estimator =
            GasCostEstimator::new(feed, relayer(), padding, multiplier, FIXED_POINT).unwrap();

        let token = Address::Evm(EvmAddress::with_last_byte(2));
        let cost = estimator
            .total_gas_cost(10, &token, U256::from(1u64), true)
            .await;

        assert_eq!(cost.native_gas_cost, U256::from(200_000u64));
        assert_eq!(cost.token_gas_cost, U256::from(6_000_000u64));
    }

    #[tokio::test]
    async fn simulation_failure_yields_sentinel() {
        let feed = Arc::new(FixedFeed {
            native: U256::ZERO,
            token: U256::ZERO,
            gas_price: U256::ZERO,
            fail: true,
        });
        let estimator =
            GasCostEstimator::new(feed, relayer(), FIXED_POINT, FIXED_POINT, FIXED_POINT).unwrap();
        let token = Address::Evm(EvmAddress::with_last_byte(2));
        let cost = estimator
            .total_gas_cost(10, &token, U256::from(1u64), true)
            .await;
        assert!(cost.is_unknown());
    }
}
