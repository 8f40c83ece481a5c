//! Opportunity Detector
//!
//! Compares one token pair across two exchanges. Each side must be a usable
//! exchange with an active, sufficiently liquid pair priced by a fresh and
//! reliable feed. Liquidity and feeds are re-read on every call.
//!
//! Price direction: a price is token B per token A. The lower-priced exchange
//! is where token A is cheap, so the loan (in token B) buys A there and sells
//! it back for B on the higher-priced exchange.

use crate::arbitrage::calculator::{ProfitCalculator, ROUND_TRIP_SWAPS};
use crate::arbitrage::opportunities::OpportunityBook;
use crate::config::ConfigManager;
use crate::error::{ArbError, Result};
use crate::market::{ExchangeRegistry, PriceFeedStore, TradingPairRegistry};
use crate::stats::StatsTracker;
use crate::types::{period_for_block, ExchangeId, Opportunity, PriceFeed, TokenId, TradingPair};
use tracing::{debug, info};

/// One side of a candidate route after all checks passed
#[derive(Debug, Clone)]
struct Leg {
    exchange: ExchangeId,
    pair: TradingPair,
    feed: PriceFeed,
}

/// Opportunity detector for cross-exchange flash arbitrage
#[derive(Clone)]
pub struct OpportunityDetector {
    exchanges: ExchangeRegistry,
    pairs: TradingPairRegistry,
    feeds: PriceFeedStore,
    book: OpportunityBook,
    config: ConfigManager,
    stats: StatsTracker,
}

impl OpportunityDetector {
    pub fn new(
        exchanges: ExchangeRegistry,
        pairs: TradingPairRegistry,
        feeds: PriceFeedStore,
        book: OpportunityBook,
        config: ConfigManager,
        stats: StatsTracker,
    ) -> Self {
        Self {
            exchanges,
            pairs,
            feeds,
            book,
            config,
            stats,
        }
    }

    /// Check one side of the route
    fn check_leg(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        exchange_id: ExchangeId,
        current_block: u64,
    ) -> Result<Leg> {
        let exchange = self
            .exchanges
            .get(exchange_id)
            .filter(|e| e.is_usable())
            .ok_or_else(|| ArbError::NotFound(format!("usable {}", exchange_id)))?;

        let pair = self
            .pairs
            .get(token_a, token_b, exchange_id)
            .filter(|p| p.exists && p.active)
            .ok_or_else(|| {
                ArbError::NotFound(format!("active pair {}/{} on {}", token_a, token_b, exchange_id))
            })?;

        if pair.liquidity < exchange.liquidity_threshold {
            return Err(ArbError::InsufficientLiquidity {
                available: pair.liquidity,
                required: exchange.liquidity_threshold,
            });
        }

        let feed = self
            .feeds
            .usable(token_a, token_b, pair.price_feed, current_block)?;

        Ok(Leg {
            exchange: exchange_id,
            pair,
            feed,
        })
    }

    /// Look for a cross-exchange opportunity for `amount` of token B.
    ///
    /// Returns `Ok(None)` when any precondition fails or the spread does not
    /// clear the loan fee plus buffer. Errors are reserved for arithmetic
    /// overflow. A returned opportunity has already been stored and counted.
    pub fn detect(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        exchange_1: ExchangeId,
        exchange_2: ExchangeId,
        amount: u128,
        current_block: u64,
    ) -> Result<Option<Opportunity>> {
        let config = self.config.snapshot();

        if exchange_1 == exchange_2 {
            debug!("Skip {}/{}: same exchange on both sides ({})", token_a, token_b, exchange_1);
            return Ok(None);
        }
        if amount == 0 || amount > config.max_loan_amount {
            debug!(
                "Skip {}/{}: amount {} outside (0, {}]",
                token_a, token_b, amount, config.max_loan_amount
            );
            return Ok(None);
        }

        let mut legs = Vec::with_capacity(2);
        for exchange_id in [exchange_1, exchange_2] {
            match self.check_leg(token_a, token_b, exchange_id, current_block) {
                Ok(leg) => legs.push(leg),
                Err(reason) => {
                    debug!("Skip {}/{} on {}: {}", token_a, token_b, exchange_id, reason);
                    return Ok(None);
                }
            }
        }
        // Buy where token A is cheaper
        legs.sort_by_key(|leg| leg.feed.price);
        let (buy, sell) = (&legs[0], &legs[1]);

        let diff_bps = ProfitCalculator::diff_bps(buy.feed.price, sell.feed.price)?;
        if !ProfitCalculator::spread_clears_fee(diff_bps, config.flash_loan_fee_bps) {
            debug!(
                "Skip {}/{}: spread {} bps does not clear fee {} bps + buffer",
                token_a, token_b, diff_bps, config.flash_loan_fee_bps
            );
            return Ok(None);
        }

        let gas_estimate = ProfitCalculator::estimate_gas(amount, ROUND_TRIP_SWAPS);
        if gas_estimate > config.gas_limit {
            debug!(
                "Skip {}/{}: gas estimate {} exceeds limit {}",
                token_a, token_b, gas_estimate, config.gas_limit
            );
            return Ok(None);
        }

        let profit_estimate = ProfitCalculator::estimated_gross(amount, diff_bps)?;
        let proceeds = amount
            .checked_add(profit_estimate)
            .ok_or_else(|| ArbError::overflow("estimated proceeds"))?;
        let estimate = ProfitCalculator::settle(
            amount,
            proceeds,
            config.flash_loan_fee_bps,
            config.min_profit_threshold,
        )?;
        let expires_at_block = current_block
            .checked_add(config.execution_timeout_blocks)
            .ok_or_else(|| ArbError::overflow("opportunity expiry block"))?;

        let opportunity = self.book.insert(|id| Opportunity {
            id,
            token_a,
            token_b,
            exchange_buy: buy.exchange,
            exchange_sell: sell.exchange,
            buy_price: buy.feed.price,
            sell_price: sell.feed.price,
            profit_estimate,
            loan_amount: amount,
            gas_estimate,
            created_at_block: current_block,
            expires_at_block,
            executed: false,
            profitable: estimate.profitable,
            buy_fee_bps: buy.pair.fee_rate_bps,
            sell_fee_bps: sell.pair.fee_rate_bps,
            diff_bps,
        });
        self.stats.record_opportunity_found(period_for_block(current_block));

        info!(
            "🎯 Opportunity #{}: {}/{} | Buy {} @ {} | Sell {} @ {} | spread {} bps | est. profit {} (net {}) | gas {} | expires {}",
            opportunity.id,
            token_a,
            token_b,
            opportunity.exchange_buy,
            opportunity.buy_price,
            opportunity.exchange_sell,
            opportunity.sell_price,
            diff_bps,
            profit_estimate,
            estimate.net_profit,
            gas_estimate,
            expires_at_block
        );
        Ok(Some(opportunity))
    }
}
