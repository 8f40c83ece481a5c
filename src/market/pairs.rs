//! Trading Pair Registry
//!
//! Per-(token A, token B, exchange) liquidity, fee and activity state.
//! Key is the full tuple so one token pair can be tracked on every exchange.

use crate::error::Result;
use crate::types::{ensure_bps, ExchangeId, TokenId, TradingPair, TradingPairConfig};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

type PairKey = (TokenId, TokenId, ExchangeId);

#[derive(Debug)]
pub struct TradingPairRegistry {
    pairs: Arc<DashMap<PairKey, TradingPair>>,
}

impl TradingPairRegistry {
    pub fn new() -> Self {
        Self {
            pairs: Arc::new(DashMap::new()),
        }
    }

    pub fn configure(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        exchange: ExchangeId,
        config: TradingPairConfig,
    ) -> Result<()> {
        ensure_bps(config.fee_rate_bps, "pair fee rate")?;

        let pair = TradingPair {
            token_a,
            token_b,
            exchange,
            exists: true,
            liquidity: config.liquidity,
            fee_rate_bps: config.fee_rate_bps,
            last_updated_block: config.last_updated_block,
            price_feed: config.price_feed,
            active: config.active,
        };
        info!(
            "Pair configured: {}/{} on {} | liquidity {} | fee {} bps | feed {}",
            token_a, token_b, exchange, pair.liquidity, pair.fee_rate_bps, pair.price_feed
        );
        self.pairs.insert((token_a, token_b, exchange), pair);
        Ok(())
    }

    /// Refresh liquidity for an existing pair. Returns false if the pair is unknown.
    pub fn update_liquidity(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        exchange: ExchangeId,
        liquidity: u128,
        block: u64,
    ) -> bool {
        match self.pairs.get_mut(&(token_a, token_b, exchange)) {
            Some(mut pair) => {
                debug!(
                    "Liquidity update: {}/{} on {} | {} -> {} @ block {}",
                    token_a, token_b, exchange, pair.liquidity, liquidity, block
                );
                pair.liquidity = liquidity;
                pair.last_updated_block = block;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, token_a: TokenId, token_b: TokenId, exchange: ExchangeId) -> Option<TradingPair> {
        self.pairs
            .get(&(token_a, token_b, exchange))
            .map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Default for TradingPairRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TradingPairRegistry {
    fn clone(&self) -> Self {
        Self {
            pairs: Arc::clone(&self.pairs),
        }
    }
}
