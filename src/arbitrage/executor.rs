//! Execution Engine
//!
//! Runs a detected opportunity end to end as one all-or-nothing unit, at the
//! block height reported by the swap backend:
//!
//! 1. claim the opportunity (not found / expired / already executed)
//! 2. reject when the bot is disabled
//! 3. borrow the loan amount in token B for the executor
//! 4. buy token A on the cheaper exchange, sell it on the pricier one
//! 5. settle realized profit net of the loan fee
//! 6. commit: repay, mark executed, append the record, update stats
//!
//! Any failure after step 3, including an unprofitable settlement, rolls back
//! the swap transaction and restores the borrower's previous loan record. The
//! opportunity stays un-executed and can be retried while it is unexpired.

use crate::arbitrage::backend::{SwapBackend, SwapLeg, SwapTransaction};
use crate::arbitrage::calculator::{ProfitBreakdown, ProfitCalculator, BASE_GAS, LOAN_GAS};
use crate::arbitrage::flash_loan::FlashLoanManager;
use crate::arbitrage::opportunities::OpportunityBook;
use crate::config::ConfigManager;
use crate::error::{ArbError, Result};
use crate::market::ExchangeRegistry;
use crate::stats::{ExecutionHistory, StatsTracker};
use crate::types::{
    period_for_block, BotConfig, ExchangeId, ExecutionRecord, FlashLoan, Opportunity, Principal,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Realized outcome of both swap legs
#[derive(Debug, Clone, Copy)]
struct Settlement {
    breakdown: ProfitBreakdown,
    gas_used: u64,
}

#[derive(Clone)]
pub struct ExecutionEngine {
    exchanges: ExchangeRegistry,
    book: OpportunityBook,
    loans: FlashLoanManager,
    config: ConfigManager,
    stats: StatsTracker,
    history: ExecutionHistory,
    backend: Arc<dyn SwapBackend>,
}

impl ExecutionEngine {
    pub fn new(
        exchanges: ExchangeRegistry,
        book: OpportunityBook,
        loans: FlashLoanManager,
        config: ConfigManager,
        stats: StatsTracker,
        history: ExecutionHistory,
        backend: Arc<dyn SwapBackend>,
    ) -> Self {
        Self {
            exchanges,
            book,
            loans,
            config,
            stats,
            history,
            backend,
        }
    }

    /// Execute opportunity `opportunity_id` on behalf of `executor`
    pub async fn execute(&self, opportunity_id: u64, executor: Principal) -> Result<ExecutionRecord> {
        let current_block = self.backend.current_block().await?;
        let claim = self.book.claim(opportunity_id, current_block)?;
        let opportunity = &claim.opportunity;

        // One snapshot for the whole attempt
        let config = self.config.snapshot();
        if !config.enabled {
            return Err(ArbError::BotDisabled);
        }

        let previous_loan = self.loans.initiate(
            executor,
            opportunity.token_b,
            opportunity.loan_amount,
            current_block,
            &config,
            opportunity.id,
        )?;

        info!(
            "🚀 Executing opportunity #{} for {} | Buy {} @ {} | Sell {} @ {} | loan {} via {}",
            opportunity.id,
            executor,
            opportunity.exchange_buy,
            opportunity.buy_price,
            opportunity.exchange_sell,
            opportunity.sell_price,
            opportunity.loan_amount,
            self.backend.name()
        );

        let mut tx = match self.backend.begin(current_block).await {
            Ok(tx) => tx,
            Err(e) => {
                self.abort(executor, previous_loan, opportunity.id, current_block, &e);
                return Err(e);
            }
        };

        let settlement = match self.run_legs(tx.as_mut(), opportunity, &config).await {
            Ok(settlement) if settlement.breakdown.profitable => settlement,
            Ok(settlement) => {
                tx.rollback().await;
                let e = ArbError::Unprofitable {
                    net_profit: settlement.breakdown.net_profit,
                    threshold: config.min_profit_threshold,
                };
                self.abort(executor, previous_loan, opportunity.id, current_block, &e);
                return Err(e);
            }
            Err(e) => {
                tx.rollback().await;
                self.abort(executor, previous_loan, opportunity.id, current_block, &e);
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            self.abort(executor, previous_loan, opportunity.id, current_block, &e);
            return Err(e);
        }

        // Swaps are final from here on
        let breakdown = settlement.breakdown;
        if let Err(e) = self.loans.repay(executor, breakdown.loan_fee_amount) {
            warn!(
                "Loan for {} was settled concurrently before repayment of opportunity #{}: {}",
                executor, opportunity.id, e
            );
        }
        self.book.mark_executed(opportunity.id)?;

        let record = self.history.append(|id| ExecutionRecord {
            id,
            opportunity_id: opportunity.id,
            executor,
            loan_amount: opportunity.loan_amount,
            profit_realized: breakdown.net_profit,
            gas_used: settlement.gas_used,
            execution_time_block: current_block,
            success: true,
            failure_reason: None,
            recorded_at: Utc::now(),
        });
        self.stats.record(period_for_block(current_block), &record);

        info!(
            "✅ Execution #{} committed: opportunity #{} | gross {} | loan fee {} | net profit {} | gas {}",
            record.id,
            opportunity.id,
            breakdown.gross_profit,
            breakdown.loan_fee_amount,
            breakdown.net_profit,
            record.gas_used
        );
        Ok(record)
    }

    /// Slippage tolerance for a leg: the tighter of the bot's and the exchange's
    fn slippage_bps(&self, exchange: ExchangeId, config: &BotConfig) -> u32 {
        self.exchanges
            .get(exchange)
            .map(|e| e.max_slippage_bps.min(config.max_slippage_bps))
            .unwrap_or(config.max_slippage_bps)
    }

    /// Stage both swaps and settle the realized proceeds
    async fn run_legs(
        &self,
        tx: &mut dyn SwapTransaction,
        opportunity: &Opportunity,
        config: &BotConfig,
    ) -> Result<Settlement> {
        let amount = opportunity.loan_amount;

        let expected_a = ProfitCalculator::quote_buy(amount, opportunity.buy_price, opportunity.buy_fee_bps)?;
        let buy = SwapLeg {
            exchange: opportunity.exchange_buy,
            token_in: opportunity.token_b,
            token_out: opportunity.token_a,
            amount_in: amount,
            min_amount_out: ProfitCalculator::min_out(
                expected_a,
                self.slippage_bps(opportunity.exchange_buy, config),
            )?,
            fee_bps: opportunity.buy_fee_bps,
        };
        let bought = tx.swap(&buy).await?;

        let expected_b =
            ProfitCalculator::quote_sell(bought.amount_out, opportunity.sell_price, opportunity.sell_fee_bps)?;
        let sell = SwapLeg {
            exchange: opportunity.exchange_sell,
            token_in: opportunity.token_a,
            token_out: opportunity.token_b,
            amount_in: bought.amount_out,
            min_amount_out: ProfitCalculator::min_out(
                expected_b,
                self.slippage_bps(opportunity.exchange_sell, config),
            )?,
            fee_bps: opportunity.sell_fee_bps,
        };
        let sold = tx.swap(&sell).await?;

        let breakdown = ProfitCalculator::settle(
            amount,
            sold.amount_out,
            config.flash_loan_fee_bps,
            config.min_profit_threshold,
        )?;
        let gas_used = BASE_GAS
            .saturating_add(LOAN_GAS)
            .saturating_add(bought.gas_used)
            .saturating_add(sold.gas_used);

        Ok(Settlement { breakdown, gas_used })
    }

    /// Undo the loan and count the failed attempt
    fn abort(
        &self,
        executor: Principal,
        previous_loan: Option<FlashLoan>,
        opportunity_id: u64,
        current_block: u64,
        reason: &ArbError,
    ) {
        self.loans.restore(executor, previous_loan, opportunity_id);
        self.stats.record_failed_attempt(period_for_block(current_block));
        warn!(
            "↩️ Execution of opportunity #{} rolled back ({}): {}",
            opportunity_id,
            reason.code(),
            reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::detector::OpportunityDetector;
    use crate::config::BotConfigUpdate;
    use crate::market::{PriceFeedStore, PriceUpdate, TradingPairRegistry};
    use crate::paper_trading::SimulatedBackend;
    use crate::types::{ExchangeConfig, LoanStatus, SourceId, TokenId, TradingPairConfig};
    use alloy::primitives::Address;

    const A: TokenId = TokenId(1);
    const B: TokenId = TokenId(2);
    const ALEX: ExchangeId = ExchangeId(1);
    const ARKADIKO: ExchangeId = ExchangeId(2);

    struct Fixture {
        feeds: PriceFeedStore,
        book: OpportunityBook,
        loans: FlashLoanManager,
        config: ConfigManager,
        stats: StatsTracker,
        history: ExecutionHistory,
        backend: SimulatedBackend,
        detector: OpportunityDetector,
        engine: ExecutionEngine,
    }

    fn executor() -> Principal {
        Address::repeat_byte(0xe0)
    }

    fn feed(source: u32, price: u128) -> PriceUpdate {
        PriceUpdate {
            token_a: A,
            token_b: B,
            price,
            block: 100,
            source: SourceId(source),
            volume_24h: 0,
            reliable: true,
        }
    }

    fn fixture() -> Fixture {
        let exchanges = ExchangeRegistry::new();
        let pairs = TradingPairRegistry::new();
        let feeds = PriceFeedStore::new();
        let book = OpportunityBook::new();
        let loans = FlashLoanManager::new();
        let config = ConfigManager::default();
        let stats = StatsTracker::new();
        let history = ExecutionHistory::new();

        for (id, name, fee) in [(ALEX, "ALEX", 30), (ARKADIKO, "ARKADIKO", 25)] {
            exchanges
                .configure(
                    id,
                    ExchangeConfig {
                        name: name.to_string(),
                        contract_address: Address::ZERO,
                        router_address: Address::ZERO,
                        fee_rate_bps: fee,
                        flash_loan_supported: true,
                        active: true,
                        liquidity_threshold: 1_000_000_000_000,
                        max_slippage_bps: 500,
                    },
                )
                .unwrap();
            pairs
                .configure(
                    A,
                    B,
                    id,
                    TradingPairConfig {
                        liquidity: 5_000_000_000_000,
                        fee_rate_bps: fee,
                        last_updated_block: 100,
                        price_feed: SourceId(id.0),
                        active: true,
                    },
                )
                .unwrap();
        }
        feeds.update(feed(1, 1_500_000)).unwrap();
        feeds.update(feed(2, 1_600_000)).unwrap();

        let backend = SimulatedBackend::new(pairs.clone(), feeds.clone());
        backend.set_block(100);
        let detector = OpportunityDetector::new(
            exchanges.clone(),
            pairs,
            feeds.clone(),
            book.clone(),
            config.clone(),
            stats.clone(),
        );
        let engine = ExecutionEngine::new(
            exchanges,
            book.clone(),
            loans.clone(),
            config.clone(),
            stats.clone(),
            history.clone(),
            Arc::new(backend.clone()),
        );
        Fixture {
            feeds,
            book,
            loans,
            config,
            stats,
            history,
            backend,
            detector,
            engine,
        }
    }

    /// Execute with the chain at `block`
    async fn execute_at(f: &Fixture, opportunity_id: u64, block: u64) -> Result<ExecutionRecord> {
        f.backend.set_block(block);
        f.engine.execute(opportunity_id, executor()).await
    }

    fn detect(f: &Fixture) -> Opportunity {
        f.detector
            .detect(A, B, ALEX, ARKADIKO, 1_000_000_000, 100)
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_profitable_execution_commits() {
        let f = fixture();
        let opp = detect(&f);

        let record = execute_at(&f, opp.id, 101).await.unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.opportunity_id, opp.id);
        assert_eq!(record.loan_amount, 1_000_000_000);
        assert_eq!(record.profit_realized, 57_808_000);
        assert_eq!(record.gas_used, 600_000);
        assert!(record.success);

        assert!(f.book.get(opp.id).unwrap().executed);
        let loan = f.loans.get(executor()).unwrap();
        assert_eq!(loan.status, LoanStatus::Repaid);
        assert_eq!(loan.fee_paid, 3_000_000);

        let stats = f.stats.get(0);
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.successful_executions, 1);
        assert_eq!(stats.total_profit, 57_808_000);
        assert_eq!(stats.opportunities_found, 1);
        assert_eq!(stats.opportunities_executed, 1);
        assert_eq!(f.backend.commits(), 1);
        assert_eq!(f.history.total_profit_earned(), 57_808_000);
    }

    #[tokio::test]
    async fn test_second_execution_rejected() {
        let f = fixture();
        let opp = detect(&f);
        execute_at(&f, opp.id, 101).await.unwrap();

        let err = execute_at(&f, opp.id, 102).await.unwrap_err();
        assert_eq!(err.code(), "ERR-ALREADY-EXECUTED");
        assert_eq!(f.history.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_expired() {
        let f = fixture();
        let err = execute_at(&f, 42, 100).await.unwrap_err();
        assert_eq!(err.code(), "ERR-NOT-FOUND");

        let opp = detect(&f);
        let err = execute_at(&f, opp.id, 111).await.unwrap_err();
        assert_eq!(err.code(), "ERR-EXPIRED");
        assert!(f.loans.get(executor()).is_none());

        // The chain cannot be wound back to before expiry
        let err = execute_at(&f, opp.id, 105).await.unwrap_err();
        assert_eq!(err.code(), "ERR-EXPIRED");
        assert!(!f.book.get(opp.id).unwrap().executed);
    }

    #[tokio::test]
    async fn test_disabled_bot_rejects_before_borrowing() {
        let f = fixture();
        let opp = detect(&f);
        f.config.set_enabled(false);

        let err = execute_at(&f, opp.id, 101).await.unwrap_err();
        assert_eq!(err.code(), "ERR-BOT-DISABLED");
        assert!(f.loans.get(executor()).is_none());

        f.config.set_enabled(true);
        assert!(execute_at(&f, opp.id, 101).await.is_ok());
    }

    #[tokio::test]
    async fn test_unprofitable_execution_rolls_back() {
        let f = fixture();
        let opp = detect(&f);
        f.config
            .update(&BotConfigUpdate {
                min_profit_threshold: Some(100_000_000),
                ..Default::default()
            })
            .unwrap();

        let err = execute_at(&f, opp.id, 101).await.unwrap_err();
        assert_eq!(err.code(), "ERR-UNPROFITABLE");
        assert!(err.is_recoverable());

        // Opportunity untouched, no record, loan as if never initiated
        let stored = f.book.get(opp.id).unwrap();
        assert!(!stored.executed);
        assert_eq!(stored.expires_at_block, 110);
        assert!(f.history.is_empty());
        assert!(f.loans.get(executor()).is_none());
        assert_eq!(f.backend.commits(), 0);
        assert_eq!(f.backend.rollbacks(), 1);
        assert_eq!(f.backend.volume(ALEX).swaps, 0);

        let stats = f.stats.get(0);
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.successful_executions, 0);
        assert_eq!(stats.total_profit, 0);

        // Retry succeeds once the threshold is back
        f.config
            .update(&BotConfigUpdate {
                min_profit_threshold: Some(1_000_000),
                ..Default::default()
            })
            .unwrap();
        assert!(execute_at(&f, opp.id, 102).await.is_ok());
    }

    #[tokio::test]
    async fn test_rollback_restores_previous_loan_record() {
        let f = fixture();
        let first = detect(&f);
        execute_at(&f, first.id, 101).await.unwrap();
        let settled = f.loans.get(executor()).unwrap();

        let second = detect(&f);
        f.backend.fail_swaps_on(ARKADIKO);
        let err = execute_at(&f, second.id, 102).await.unwrap_err();
        assert_eq!(err.code(), "ERR-BACKEND");
        assert_eq!(f.loans.get(executor()).unwrap(), settled);
    }

    #[tokio::test]
    async fn test_price_move_beyond_slippage_rolls_back() {
        let f = fixture();
        let opp = detect(&f);
        // Sell side drops 10%, beyond the 3% bot tolerance
        f.feeds.update(feed(2, 1_440_000)).unwrap();

        let err = execute_at(&f, opp.id, 101).await.unwrap_err();
        assert_eq!(err.code(), "ERR-BACKEND");
        assert!(!f.book.get(opp.id).unwrap().executed);
        assert!(!f.loans.has_active_loan(executor()));
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let f = fixture();
        let opp = detect(&f);
        f.backend.set_fail_commit(true);

        let err = execute_at(&f, opp.id, 101).await.unwrap_err();
        assert_eq!(err.code(), "ERR-BACKEND");
        assert!(f.loans.get(executor()).is_none());
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_active_loan_blocks_execution() {
        let f = fixture();
        let opp = detect(&f);
        f.loans
            .initiate(executor(), B, 10, 100, &f.config.snapshot(), 99)
            .unwrap();

        let err = execute_at(&f, opp.id, 101).await.unwrap_err();
        assert_eq!(err.code(), "ERR-ALREADY-ACTIVE-LOAN");
        assert_eq!(f.loans.get(executor()).unwrap().arbitrage_id, 99);
        assert!(!f.book.get(opp.id).unwrap().executed);
    }
}
