//! Simulated Swap Backend
//!
//! In-memory ledger for paper trading and tests. Swaps fill at the latest
//! feed price of the pair on the target exchange, minus the leg's fee, and
//! are staged until the transaction commits. Rolled-back or failed
//! transactions leave the ledger untouched.
//!
//! The chain height is set by the caller and only moves forward. Failures
//! can be injected per exchange (every swap there is refused) or at commit
//! time.

use crate::arbitrage::backend::{SwapBackend, SwapFill, SwapLeg, SwapTransaction};
use crate::arbitrage::calculator::{ProfitCalculator, SWAP_GAS};
use crate::error::{ArbError, Result};
use crate::market::{PriceFeedStore, TradingPairRegistry};
use crate::types::ExchangeId;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Committed totals on one exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeVolume {
    pub swaps: u64,
    pub amount_in: u128,
    pub amount_out: u128,
}

#[derive(Debug)]
struct Ledger {
    block: AtomicU64,
    volumes: DashMap<ExchangeId, ExchangeVolume>,
    failing_exchanges: DashSet<ExchangeId>,
    fail_commit: AtomicBool,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Simulated backend priced off the shared feed store
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    pairs: TradingPairRegistry,
    feeds: PriceFeedStore,
    ledger: Arc<Ledger>,
}

impl SimulatedBackend {
    pub fn new(pairs: TradingPairRegistry, feeds: PriceFeedStore) -> Self {
        Self {
            pairs,
            feeds,
            ledger: Arc::new(Ledger {
                block: AtomicU64::new(0),
                volumes: DashMap::new(),
                failing_exchanges: DashSet::new(),
                fail_commit: AtomicBool::new(false),
                commits: AtomicU64::new(0),
                rollbacks: AtomicU64::new(0),
            }),
        }
    }

    /// Move the chain to `block`. Heights never go back; returns the height
    /// in effect afterwards.
    pub fn set_block(&self, block: u64) -> u64 {
        let previous = self.ledger.block.fetch_max(block, Ordering::SeqCst);
        if block < previous {
            warn!("[SIM] ignoring rewind from block {} to {}", previous, block);
        }
        previous.max(block)
    }

    /// Mine `blocks` empty blocks; returns the new height
    pub fn advance_blocks(&self, blocks: u64) -> u64 {
        let previous = self
            .ledger
            .block
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| Some(b.saturating_add(blocks)))
            .unwrap_or_else(|b| b);
        previous.saturating_add(blocks)
    }

    /// Refuse every swap routed to `exchange`
    pub fn fail_swaps_on(&self, exchange: ExchangeId) {
        self.ledger.failing_exchanges.insert(exchange);
    }

    /// Make every commit fail while set
    pub fn set_fail_commit(&self, fail: bool) {
        self.ledger.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn commits(&self) -> u64 {
        self.ledger.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> u64 {
        self.ledger.rollbacks.load(Ordering::SeqCst)
    }

    /// Committed volume on `exchange`
    pub fn volume(&self, exchange: ExchangeId) -> ExchangeVolume {
        self.ledger
            .volumes
            .get(&exchange)
            .map(|v| *v)
            .unwrap_or_default()
    }

    /// Price a leg against the current feed without staging anything
    pub fn quote(&self, leg: &SwapLeg) -> Result<u128> {
        // Pairs are stored as (A, B) with prices in B per A.
        // B -> A is a buy of A, A -> B a sell.
        if let Some(pair) = self.pairs.get(leg.token_out, leg.token_in, leg.exchange) {
            let feed = self
                .feeds
                .get(leg.token_out, leg.token_in, pair.price_feed)
                .ok_or_else(|| ArbError::NotFound(format!("price feed for {} on {}", leg.token_out, leg.exchange)))?;
            return ProfitCalculator::quote_buy(leg.amount_in, feed.price, leg.fee_bps);
        }
        if let Some(pair) = self.pairs.get(leg.token_in, leg.token_out, leg.exchange) {
            let feed = self
                .feeds
                .get(leg.token_in, leg.token_out, pair.price_feed)
                .ok_or_else(|| ArbError::NotFound(format!("price feed for {} on {}", leg.token_in, leg.exchange)))?;
            return ProfitCalculator::quote_sell(leg.amount_in, feed.price, leg.fee_bps);
        }
        Err(ArbError::NotFound(format!(
            "pair {}/{} on {}",
            leg.token_in, leg.token_out, leg.exchange
        )))
    }
}

#[async_trait]
impl SwapBackend for SimulatedBackend {
    async fn current_block(&self) -> Result<u64> {
        Ok(self.ledger.block.load(Ordering::SeqCst))
    }

    async fn begin(&self, block: u64) -> Result<Box<dyn SwapTransaction>> {
        Ok(Box::new(SimulatedTransaction {
            backend: self.clone(),
            block,
            staged: Vec::new(),
        }))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

struct SimulatedTransaction {
    backend: SimulatedBackend,
    block: u64,
    staged: Vec<(SwapLeg, SwapFill)>,
}

#[async_trait]
impl SwapTransaction for SimulatedTransaction {
    async fn swap(&mut self, leg: &SwapLeg) -> Result<SwapFill> {
        if self.backend.ledger.failing_exchanges.contains(&leg.exchange) {
            return Err(ArbError::Backend(format!("swap refused by {}", leg.exchange)));
        }

        let amount_out = self.backend.quote(leg)?;
        if amount_out < leg.min_amount_out {
            return Err(ArbError::Backend(format!(
                "slippage on {}: got {}, minimum {}",
                leg.exchange, amount_out, leg.min_amount_out
            )));
        }

        let fill = SwapFill {
            amount_out,
            gas_used: SWAP_GAS,
        };
        debug!(
            "[SIM] staged swap on {} @ block {}: {} {} -> {} {}",
            leg.exchange, self.block, leg.amount_in, leg.token_in, amount_out, leg.token_out
        );
        self.staged.push((leg.clone(), fill));
        Ok(fill)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let ledger = &self.backend.ledger;
        if ledger.fail_commit.load(Ordering::SeqCst) {
            ledger.rollbacks.fetch_add(1, Ordering::SeqCst);
            warn!("[SIM] commit failed @ block {}, {} swaps discarded", self.block, self.staged.len());
            return Err(ArbError::Backend("commit rejected".into()));
        }

        for (leg, fill) in &self.staged {
            let mut volume = ledger.volumes.entry(leg.exchange).or_default();
            volume.swaps += 1;
            volume.amount_in = volume.amount_in.saturating_add(leg.amount_in);
            volume.amount_out = volume.amount_out.saturating_add(fill.amount_out);
        }
        ledger.commits.fetch_add(1, Ordering::SeqCst);
        info!("[SIM] committed {} swaps @ block {}", self.staged.len(), self.block);
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        self.backend.ledger.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!("[SIM] rolled back {} staged swaps @ block {}", self.staged.len(), self.block);
    }
}
