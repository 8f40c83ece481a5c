//! Price Feed Store
//!
//! Latest oracle price per (token A, token B, source). Each trading pair names
//! the source that prices it, so two exchanges listing the same tokens can be
//! priced independently. Authorization of the oracle happens in the caller.

use crate::error::{ArbError, Result};
use crate::types::{Price, PriceFeed, SourceId, TokenId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

type FeedKey = (TokenId, TokenId, SourceId);

/// Raw oracle update, validated by `PriceFeedStore::update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub price: u128,
    pub block: u64,
    pub source: SourceId,
    pub volume_24h: u128,
    pub reliable: bool,
}

#[derive(Debug)]
pub struct PriceFeedStore {
    feeds: Arc<DashMap<FeedKey, PriceFeed>>,
}

impl PriceFeedStore {
    pub fn new() -> Self {
        Self {
            feeds: Arc::new(DashMap::new()),
        }
    }

    /// Store a price sample. A zero price is rejected before anything is written.
    pub fn update(&self, update: PriceUpdate) -> Result<()> {
        let price = Price::new(update.price)?;

        debug!(
            "Price feed: {}/{} from {} = {} @ block {} (reliable: {})",
            update.token_a, update.token_b, update.source, price, update.block, update.reliable
        );
        self.feeds.insert(
            (update.token_a, update.token_b, update.source),
            PriceFeed {
                price,
                last_updated_block: update.block,
                source: update.source,
                volume_24h: update.volume_24h,
                reliable: update.reliable,
            },
        );
        Ok(())
    }

    pub fn get(&self, token_a: TokenId, token_b: TokenId, source: SourceId) -> Option<PriceFeed> {
        self.feeds
            .get(&(token_a, token_b, source))
            .map(|entry| entry.clone())
    }

    /// Feed that may be used for detection: present, reliable and fresh
    pub fn usable(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        source: SourceId,
        current_block: u64,
    ) -> Result<PriceFeed> {
        let feed = self
            .get(token_a, token_b, source)
            .ok_or_else(|| ArbError::NotFound(format!("price feed {}/{} from {}", token_a, token_b, source)))?;

        if !feed.reliable || !feed.is_fresh(current_block) {
            return Err(ArbError::StalePrice {
                last_updated: feed.last_updated_block,
                current_block,
            });
        }
        Ok(feed)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl Default for PriceFeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PriceFeedStore {
    fn clone(&self) -> Self {
        Self {
            feeds: Arc::clone(&self.feeds),
        }
    }
}
