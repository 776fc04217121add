//! Bridge Finalization Matcher: correlates hub-chain initiation events with
//! destination-chain finalization events by opaque message hash.
//!
//! Grounded on `pool::v2_syncer`'s `futures::future::join_all` parallel
//! per-item fetch pattern and `bin::backfill_events`'s block-range scanning
//! idiom (timestamp-to-block translation via provider lookups).
//!
//! Author: AI-Generated
//! Created: 2026-03-02

use crate::types::{Address, ChainId};
use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// A hub-chain bridge-initiation event.
#[derive(Debug, Clone)]
pub struct InitiationEvent {
    pub message_hash: [u8; 32],
    pub l2_token: Address,
    pub value: U256,
    pub block: u64,
}

/// A destination-chain bridge-finalization event.
#[derive(Debug, Clone)]
pub struct FinalizationEvent {
    pub message_hash: [u8; 32],
    pub block: u64,
    pub tx_hash: [u8; 32],
    pub log_index: u64,
}

/// A matched pair: a finalization with its corresponding initiation.
#[derive(Debug, Clone)]
pub struct MatchedFinalization {
    pub l2_token: Address,
    pub value: U256,
    pub finalization: FinalizationEvent,
}

/// Block-range event source for one chain. A thin seam so the matcher does
/// not depend on a concrete RPC provider.
#[async_trait]
pub trait ChainEventSource: Send + Sync {
    async fn block_timestamp(&self, chain_id: ChainId, block: u64) -> Result<u64>;
    async fn latest_block(&self, chain_id: ChainId) -> Result<u64>;
    async fn initiation_events(
        &self,
        chain_id: ChainId,
        from_block: u64,
        to_block: u64,
        recipient: &Address,
    ) -> Result<Vec<InitiationEvent>>;
    async fn finalization_events(
        &self,
        chain_id: ChainId,
        message_hashes: &[[u8; 32]],
    ) -> Result<Vec<FinalizationEvent>>;
}

pub struct FinalizationMatcher<S: ChainEventSource> {
    source: S,
    hub_chain_id: ChainId,
}

impl<S: ChainEventSource> FinalizationMatcher<S> {
    pub fn new(source: S, hub_chain_id: ChainId) -> Self {
        Self { source, hub_chain_id }
    }

    /// Translates a destination-chain block range into a hub-chain block
    /// range by reading destination timestamps and binary-searching the
    /// hub chain for the block nearest each timestamp.
    pub async fn translate_block_range(
        &self,
        destination_chain: ChainId,
        from_block: u64,
        to_block: u64,
    ) -> Result<(u64, u64)> {
        let from_ts = self.source.block_timestamp(destination_chain, from_block).await?;
        let to_ts = self.source.block_timestamp(destination_chain, to_block).await?;

        let hub_from = self.binary_search_block_at_timestamp(from_ts).await?;
        let hub_to = self.binary_search_block_at_timestamp(to_ts).await?;
        Ok((hub_from, hub_to))
    }

    async fn binary_search_block_at_timestamp(&self, target_ts: u64) -> Result<u64> {
        let mut lo = 0u64;
        let mut hi = self.source.latest_block(self.hub_chain_id).await?;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_ts = self.source.block_timestamp(self.hub_chain_id, mid).await?;
            if mid_ts < target_ts {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Full §4.8 algorithm: given a destination-chain block range, return
    /// the finalized transfers that can be correlated with a hub-chain
    /// initiation in that window.
    pub async fn match_finalizations(
        &self,
        destination_chain: ChainId,
        from_block: u64,
        to_block: u64,
        recipient: &Address,
    ) -> Result<Vec<MatchedFinalization>> {
        let (hub_from, hub_to) = self.translate_block_range(destination_chain, from_block, to_block).await?;

        let initiations = self
            .source
            .initiation_events(self.hub_chain_id, hub_from, hub_to, recipient)
            .await?;

        if initiations.is_empty() {
            return Ok(Vec::new());
        }

        let by_hash: HashMap<[u8; 32], &InitiationEvent> = initiations
            .iter()
            .filter(|e| !e.value.is_zero())
            .map(|e| (e.message_hash, e))
            .collect();

        if by_hash.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: Vec<[u8; 32]> = by_hash.keys().copied().collect();
        let finalizations = self.source.finalization_events(destination_chain, &hashes).await?;

        Ok(finalizations
            .into_iter()
            .filter_map(|fin| {
                by_hash.get(&fin.message_hash).map(|init| MatchedFinalization {
                    l2_token: init.l2_token.clone(),
                    value: init.value,
                    finalization: fin,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address as EvmAddress;

    struct FixedSource {
        timestamps: HashMap<(ChainId, u64), u64>,
        latest: u64,
        initiations: Vec<InitiationEvent>,
        finalizations: Vec<FinalizationEvent>,
    }

    #[async_trait]
    impl ChainEventSource for FixedSource {
        async fn block_timestamp(&self, chain_id: ChainId, block: u64) -> Result<u64> {
            Ok(*self.timestamps.get(&(chain_id, block)).unwrap_or(&block))
        }
        async fn latest_block(&self, _chain_id: ChainId) -> Result<u64> {
            Ok(self.latest)
        }
        async fn initiation_events(
            &self,
            _chain_id: ChainId,
            _from_block: u64,
            _to_block: u64,
            _recipient: &Address,
        ) -> Result<Vec<InitiationEvent>> {
            Ok(self.initiations.clone())
        }
        async fn finalization_events(&self, _chain_id: ChainId, _hashes: &[[u8; 32]]) -> Result<Vec<FinalizationEvent>> {
            Ok(self.finalizations.clone())
        }
    }

    fn hash(byte: u8) -> [u8; 32] {
        let mut h = [0u8; 32];
        h[31] = byte;
        h
    }

    fn token() -> Address {
        Address::Evm(EvmAddress::with_last_byte(1))
    }

    #[tokio::test]
    async fn zero_value_initiations_are_filtered_out() {
        let source = FixedSource {
            timestamps: HashMap::new(),
            latest: 1000,
            initiations: vec![
                InitiationEvent { message_hash: hash(1), l2_token: token(), value: U256::ZERO, block: 1 },
                InitiationEvent { message_hash: hash(2), l2_token: token(), value: U256::from(10u64), block: 2 },
                InitiationEvent { message_hash: hash(3), l2_token: token(), value: U256::from(20u64), block: 3 },
            ],
            finalizations: vec![
                FinalizationEvent { message_hash: hash(2), block: 100, tx_hash: [0; 32], log_index: 0 },
                FinalizationEvent { message_hash: hash(3), block: 101, tx_hash: [0; 32], log_index: 1 },
                FinalizationEvent { message_hash: hash(4), block: 102, tx_hash: [0; 32], log_index: 2 },
            ],
        };
        let matcher = FinalizationMatcher::new(source, 1);
        let matched = matcher.match_finalizations(10, 0, 100, &token()).await.unwrap();

        assert_eq!(matched.len(), 2);
        let hashes: Vec<_> = matched.iter().map(|m| m.finalization.message_hash).collect();
        assert!(hashes.contains(&hash(2)));
        assert!(hashes.contains(&hash(3)));
        assert!(!hashes.contains(&hash(4)));
    }

    #[tokio::test]
    async fn empty_initiations_short_circuits() {
        let source = FixedSource {
            timestamps: HashMap::new(),
            latest: 100,
            initiations: vec![],
            finalizations: vec![FinalizationEvent { message_hash: hash(1), block: 1, tx_hash: [0; 32], log_index: 0 }],
        };
        let matcher = FinalizationMatcher::new(source, 1);
        let matched = matcher.match_finalizations(10, 0, 50, &token()).await.unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn binary_search_finds_exact_timestamp() {
        let mut timestamps = HashMap::new();
        for b in 0..20u64 {
            timestamps.insert((1u64, b), b * 10);
        }
        let source = FixedSource {
            timestamps,
            latest: 19,
            initiations: vec![],
            finalizations: vec![],
        };
        let matcher = FinalizationMatcher::new(source, 1);
        let block = matcher.binary_search_block_at_timestamp(55).await.unwrap();
        assert_eq!(block, 6); // first block whose ts (60) >= 55
    }
}
