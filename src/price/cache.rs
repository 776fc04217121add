//! Price Cache: an ordered-fallback USD price lookup, kept warm by
//! `update()` and read many times per tick by the profit engine and
//! accountant.
//!
//! Grounded on the teacher's `tax::price_oracle::PriceOracle` (stale-cache
//! preserved on failure, best-effort refresh) and `pool::state::PoolStateManager`
//! (`Arc<DashMap<..>>` handle, manual `Clone`, `Default`).
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::collaborators::PriceFeed;
use crate::types::{Address, TOKEN_EQUIVALENCE_REMAPPING};
use alloy::primitives::U256;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Thread-safe, cloneable price cache. Reads never block on the network;
/// only `update()` does.
#[derive(Clone)]
pub struct PriceCache {
    prices: Arc<DashMap<String, U256>>,
    stale: Arc<AtomicBool>,
    feeds: Arc<Vec<Arc<dyn PriceFeed>>>,
}

impl PriceCache {
    /// `feeds` are consulted in order; the first to resolve a price for an
    /// address wins, per the spec's "canonical feed first, then fallbacks"
    /// ordering rule.
    pub fn new(feeds: Vec<Arc<dyn PriceFeed>>) -> Self {
        Self {
            prices: Arc::new(DashMap::new()),
            stale: Arc::new(AtomicBool::new(false)),
            feeds: Arc::new(feeds),
        }
    }

    /// Look up the USD price of a token by symbol, applying the
    /// equivalence remapping as a fallback. Returns zero for unknown
    /// tokens; callers treat zero price as "cannot evaluate profitability".
    pub fn get_price(&self, symbol_or_key: &str) -> U256 {
        if let Some(price) = self.prices.get(symbol_or_key) {
            return *price;
        }
        if let Some(canonical) = TOKEN_EQUIVALENCE_REMAPPING.get(symbol_or_key) {
            if let Some(price) = self.prices.get(*canonical) {
                return *price;
            }
        }
        warn!(token = symbol_or_key, "no cached price for token");
        U256::ZERO
    }

    /// True if the last `update()` call failed and the cache is serving
    /// stale data.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    /// Refreshes prices for the given set of addresses, keyed by their
    /// native string form. Consults feeds in configured order; the first
    /// feed to resolve a given address wins. On total failure the previous
    /// cache contents are left untouched and an error is returned — callers
    /// keep operating on stale data rather than treating this as fatal.
    pub async fn update(&self, addresses: &[Address]) -> Result<()> {
        let mut unresolved: Vec<Address> = addresses.to_vec();
        let mut any_feed_succeeded = false;

        for feed in self.feeds.iter() {
            if unresolved.is_empty() {
                break;
            }
            match feed.get_prices_by_address(&unresolved).await {
                Ok(resolved) => {
                    any_feed_succeeded = true;
                    unresolved.retain(|addr| {
                        if let Some(price) = resolved.get(addr) {
                            self.prices.insert(addr.to_native(), *price);
                            false
                        } else {
                            true
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "price feed failed, trying next fallback");
                }
            }
        }

        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "some token prices could not be resolved this tick");
        }

        if !any_feed_succeeded {
            self.stale.store(true, Ordering::Relaxed);
            anyhow::bail!("all price feeds failed; serving stale cache");
        }

        self.stale.store(false, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address as EvmAddress;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticFeed(HashMap<Address, U256>);

    #[async_trait]
    impl PriceFeed for StaticFeed {
        async fn get_prices_by_address(
            &self,
            addresses: &[Address],
        ) -> Result<HashMap<Address, U256>> {
            Ok(addresses
                .iter()
                .filter_map(|a| self.0.get(a).map(|p| (a.clone(), *p)))
                .collect())
        }
    }

    struct FailingFeed;

    #[async_trait]
    impl PriceFeed for FailingFeed {
        async fn get_prices_by_address(
            &self,
            _addresses: &[Address],
        ) -> Result<HashMap<Address, U256>> {
            anyhow::bail!("feed unreachable")
        }
    }

    fn usdc() -> Address {
        Address::Evm(EvmAddress::with_last_byte(1))
    }

    #[tokio::test]
    async fn resolves_price_from_first_working_feed() {
        let mut prices = HashMap::new();
        prices.insert(usdc(), U256::from(1_000_000_000_000_000_000u128));
        let cache = PriceCache::new(vec![Arc::new(FailingFeed), Arc::new(StaticFeed(prices))]);

        cache.update(&[usdc()]).await.unwrap();
        assert_eq!(
            cache.get_price(&usdc().to_native()),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn preserves_stale_cache_on_total_failure() {
        let mut prices = HashMap::new();
        prices.insert(usdc(), U256::from(42u64));
        let cache = PriceCache::new(vec![Arc::new(StaticFeed(prices))]);
        cache.update(&[usdc()]).await.unwrap();

        let failing_cache = PriceCache {
            prices: cache.prices.clone(),
            stale: cache.stale.clone(),
            feeds: Arc::new(vec![Arc::new(FailingFeed) as Arc<dyn PriceFeed>]),
        };
        let result = failing_cache.update(&[usdc()]).await;
        assert!(result.is_err());
        assert_eq!(failing_cache.get_price(&usdc().to_native()), U256::from(42u64));
        assert!(failing_cache.is_stale());
    }

    #[test]
    fn unknown_token_returns_zero() {
        let cache = PriceCache::new(vec![]);
        assert_eq!(cache.get_price("UNKNOWN"), U256::ZERO);
    }
}
