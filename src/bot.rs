//! Flash Arbitrage Bot
//!
//! Public operation surface with access control. The owner configures the
//! market and the bot; oracles (and the owner) push prices; anyone may detect,
//! execute, force-repay an expired loan and read state.
//!
//! Block-dependent operations take the height from the swap backend, never
//! from the caller.
//!
//! Authorization is checked before any argument validation, so a non-owner
//! always gets `Unauthorized` no matter what it sends.

use crate::arbitrage::{
    ExecutionEngine, FlashLoanManager, OpportunityBook, OpportunityDetector, ProfitCalculator,
    SwapBackend,
};
use crate::config::{parse_optional_address, BotConfigUpdate, ConfigManager, ScenarioConfig};
use crate::error::{ArbError, Result};
use crate::market::{ExchangeRegistry, PriceFeedStore, PriceUpdate, TradingPairRegistry};
use crate::paper_trading::SimulatedBackend;
use crate::stats::{ExecutionHistory, StatsPeriod, StatsTracker};
use crate::types::{
    period_for_block, BotConfig, Exchange, ExchangeConfig, ExchangeId, ExecutionRecord, FlashLoan,
    Opportunity, PriceFeed, Principal, SourceId, TokenId, TradingPair, TradingPairConfig,
};
use anyhow::Context;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Arbitrage id recorded on loans taken outside an execution
pub const MANUAL_LOAN_ID: u64 = 0;

pub struct FlashArbBot {
    owner: Principal,
    oracles: Arc<DashSet<Principal>>,
    exchanges: ExchangeRegistry,
    pairs: TradingPairRegistry,
    feeds: PriceFeedStore,
    book: OpportunityBook,
    loans: FlashLoanManager,
    config: ConfigManager,
    stats: StatsTracker,
    history: ExecutionHistory,
    detector: OpportunityDetector,
    engine: ExecutionEngine,
    backend: Arc<dyn SwapBackend>,
}

impl FlashArbBot {
    /// Create a bot executing through `backend`
    pub fn new(owner: Principal, config: BotConfig, backend: Arc<dyn SwapBackend>) -> Result<Self> {
        Self::with_backend(owner, config, |_, _| backend)
    }

    /// Create a bot whose backend needs the bot's own market stores
    pub fn with_backend<F>(owner: Principal, config: BotConfig, make_backend: F) -> Result<Self>
    where
        F: FnOnce(&TradingPairRegistry, &PriceFeedStore) -> Arc<dyn SwapBackend>,
    {
        let config = ConfigManager::new(config)?;
        let exchanges = ExchangeRegistry::new();
        let pairs = TradingPairRegistry::new();
        let feeds = PriceFeedStore::new();
        let book = OpportunityBook::new();
        let loans = FlashLoanManager::new();
        let stats = StatsTracker::new();
        let history = ExecutionHistory::new();
        let backend = make_backend(&pairs, &feeds);

        let detector = OpportunityDetector::new(
            exchanges.clone(),
            pairs.clone(),
            feeds.clone(),
            book.clone(),
            config.clone(),
            stats.clone(),
        );
        let engine = ExecutionEngine::new(
            exchanges.clone(),
            book.clone(),
            loans.clone(),
            config.clone(),
            stats.clone(),
            history.clone(),
            backend.clone(),
        );

        info!("Flash arbitrage bot created (owner {})", owner);
        Ok(Self {
            owner,
            oracles: Arc::new(DashSet::new()),
            exchanges,
            pairs,
            feeds,
            book,
            loans,
            config,
            stats,
            history,
            detector,
            engine,
            backend,
        })
    }

    /// Bot backed by a `SimulatedBackend` over its own pairs and feeds
    pub fn paper(owner: Principal, config: BotConfig) -> Result<(Self, SimulatedBackend)> {
        let mut simulated = None;
        let bot = Self::with_backend(owner, config, |pairs, feeds| {
            let backend = SimulatedBackend::new(pairs.clone(), feeds.clone());
            simulated = Some(backend.clone());
            Arc::new(backend) as Arc<dyn SwapBackend>
        })?;
        let backend = simulated.ok_or_else(|| ArbError::Backend("simulated backend not created".into()))?;
        Ok((bot, backend))
    }

    pub fn owner(&self) -> Principal {
        self.owner
    }

    /// Chain height as reported by the swap backend
    pub async fn current_block(&self) -> Result<u64> {
        self.backend.current_block().await
    }

    fn ensure_owner(&self, caller: Principal, operation: &str) -> Result<()> {
        if caller != self.owner {
            warn!("Unauthorized {} attempt by {}", operation, caller);
            return Err(ArbError::Unauthorized(format!("{} is owner-only", operation)));
        }
        Ok(())
    }

    fn ensure_oracle(&self, caller: Principal) -> Result<()> {
        if !self.is_oracle(caller) {
            warn!("Unauthorized price update by {}", caller);
            return Err(ArbError::Unauthorized("price updates require the oracle role".into()));
        }
        Ok(())
    }

    // ── Administration (owner) ───────────────────────────────────────

    pub fn configure_exchange(&self, caller: Principal, id: ExchangeId, config: ExchangeConfig) -> Result<()> {
        self.ensure_owner(caller, "configure_exchange")?;
        self.exchanges.configure(id, config)
    }

    /// Take an exchange in or out of rotation. Exchanges are never deleted.
    pub fn set_exchange_active(&self, caller: Principal, id: ExchangeId, active: bool) -> Result<()> {
        self.ensure_owner(caller, "set_exchange_active")?;
        self.exchanges.set_active(id, active)
    }

    pub fn configure_trading_pair(
        &self,
        caller: Principal,
        token_a: TokenId,
        token_b: TokenId,
        exchange: ExchangeId,
        config: TradingPairConfig,
    ) -> Result<()> {
        self.ensure_owner(caller, "configure_trading_pair")?;
        self.pairs.configure(token_a, token_b, exchange, config)
    }

    pub fn set_bot_enabled(&self, caller: Principal, enabled: bool) -> Result<()> {
        self.ensure_owner(caller, "set_bot_enabled")?;
        self.config.set_enabled(enabled);
        Ok(())
    }

    pub fn update_bot_config(&self, caller: Principal, update: &BotConfigUpdate) -> Result<BotConfig> {
        self.ensure_owner(caller, "update_bot_config")?;
        self.config.update(update)
    }

    pub fn add_oracle(&self, caller: Principal, oracle: Principal) -> Result<()> {
        self.ensure_owner(caller, "add_oracle")?;
        if self.oracles.insert(oracle) {
            info!("Oracle added: {}", oracle);
        }
        Ok(())
    }

    /// Returns whether the principal held the role
    pub fn remove_oracle(&self, caller: Principal, oracle: Principal) -> Result<bool> {
        self.ensure_owner(caller, "remove_oracle")?;
        let removed = self.oracles.remove(&oracle).is_some();
        if removed {
            info!("Oracle removed: {}", oracle);
        }
        Ok(removed)
    }

    /// The owner always holds the oracle role
    pub fn is_oracle(&self, principal: Principal) -> bool {
        principal == self.owner || self.oracles.contains(&principal)
    }

    // ── Price ingestion (oracle) ─────────────────────────────────────

    pub fn update_price_feed(&self, caller: Principal, update: PriceUpdate) -> Result<()> {
        self.ensure_oracle(caller)?;
        self.feeds.update(update)
    }

    /// Refresh a pair's liquidity from an oracle observation
    pub fn update_liquidity(
        &self,
        caller: Principal,
        token_a: TokenId,
        token_b: TokenId,
        exchange: ExchangeId,
        liquidity: u128,
        block: u64,
    ) -> Result<()> {
        self.ensure_oracle(caller)?;
        if self.pairs.update_liquidity(token_a, token_b, exchange, liquidity, block) {
            Ok(())
        } else {
            Err(ArbError::NotFound(format!("pair {}/{} on {}", token_a, token_b, exchange)))
        }
    }

    // ── Arbitrage (any caller) ───────────────────────────────────────

    pub async fn detect_opportunity(
        &self,
        token_a: TokenId,
        token_b: TokenId,
        exchange_1: ExchangeId,
        exchange_2: ExchangeId,
        amount: u128,
    ) -> Result<Option<Opportunity>> {
        let current_block = self.current_block().await?;
        self.detector
            .detect(token_a, token_b, exchange_1, exchange_2, amount, current_block)
    }

    pub async fn execute_arbitrage(&self, caller: Principal, opportunity_id: u64) -> Result<ExecutionRecord> {
        self.engine.execute(opportunity_id, caller).await
    }

    /// Borrow outside an arbitrage execution. The caller must repay before
    /// borrowing again, or the loan can be force-repaid once it expires.
    pub async fn initiate_flash_loan(&self, caller: Principal, token: TokenId, amount: u128) -> Result<FlashLoan> {
        let current_block = self.current_block().await?;
        let config = self.config.snapshot();
        if !config.enabled {
            return Err(ArbError::BotDisabled);
        }
        self.loans
            .initiate(caller, token, amount, current_block, &config, MANUAL_LOAN_ID)?;
        self.loans
            .get(caller)
            .ok_or_else(|| ArbError::NotFound(format!("flash loan for {}", caller)))
    }

    /// Repay the caller's active loan plus the configured loan fee
    pub fn repay_flash_loan(&self, caller: Principal) -> Result<FlashLoan> {
        let loan = self
            .loans
            .get(caller)
            .filter(|loan| !loan.repaid())
            .ok_or_else(|| ArbError::NotFound(format!("active flash loan for {}", caller)))?;
        let fee = ProfitCalculator::bps_of(loan.loan_amount, self.config.snapshot().flash_loan_fee_bps)?;
        self.loans.repay(caller, fee)
    }

    /// Close `borrower`'s loan once the chain is past its expiry. Open to any caller.
    pub async fn force_repay_expired_loan(&self, borrower: Principal) -> Result<FlashLoan> {
        let current_block = self.current_block().await?;
        self.loans.force_repay(borrower, current_block)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_exchange(&self, id: ExchangeId) -> Option<Exchange> {
        self.exchanges.get(id)
    }

    pub fn is_exchange_usable(&self, id: ExchangeId) -> bool {
        self.exchanges.is_usable(id)
    }

    pub fn get_trading_pair(&self, token_a: TokenId, token_b: TokenId, exchange: ExchangeId) -> Option<TradingPair> {
        self.pairs.get(token_a, token_b, exchange)
    }

    pub fn get_price_feed(&self, token_a: TokenId, token_b: TokenId, source: SourceId) -> Option<PriceFeed> {
        self.feeds.get(token_a, token_b, source)
    }

    pub fn get_opportunity(&self, id: u64) -> Option<Opportunity> {
        self.book.get(id)
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.book.all()
    }

    pub fn get_flash_loan(&self, borrower: Principal) -> Option<FlashLoan> {
        self.loans.get(borrower)
    }

    pub fn get_execution(&self, id: u64) -> Option<ExecutionRecord> {
        self.history.get(id)
    }

    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.history.all()
    }

    pub fn total_profit_earned(&self) -> u128 {
        self.history.total_profit_earned()
    }

    pub fn get_stats(&self, period: u64) -> StatsPeriod {
        self.stats.get(period)
    }

    pub fn get_stats_for_block(&self, block: u64) -> StatsPeriod {
        self.stats.get(period_for_block(block))
    }

    pub fn stats_periods(&self) -> Vec<StatsPeriod> {
        self.stats.periods()
    }

    pub fn bot_config(&self) -> BotConfig {
        self.config.snapshot()
    }

    // ── Scenario loading ─────────────────────────────────────────────

    /// Apply a scenario's oracles, exchanges, pairs and feeds as `caller`.
    /// Feeds without a block are stamped with the current chain height.
    pub async fn load_scenario(
        &self,
        caller: Principal,
        scenario: &ScenarioConfig,
        oracles: &[Principal],
    ) -> anyhow::Result<()> {
        let current_block = self
            .current_block()
            .await
            .context("Failed to read the current block")?;
        for oracle in oracles {
            self.add_oracle(caller, *oracle)?;
        }

        for entry in &scenario.exchanges {
            let config = ExchangeConfig {
                name: entry.name.clone(),
                contract_address: parse_optional_address(entry.contract_address.as_deref(), "contract")?,
                router_address: parse_optional_address(entry.router_address.as_deref(), "router")?,
                fee_rate_bps: entry.fee_rate_bps,
                flash_loan_supported: entry.flash_loan_supported,
                active: entry.active,
                liquidity_threshold: entry.liquidity_threshold,
                max_slippage_bps: entry.max_slippage_bps,
            };
            self.configure_exchange(caller, ExchangeId(entry.id), config)
                .with_context(|| format!("Failed to configure exchange {} ({})", entry.id, entry.name))?;
        }

        for entry in &scenario.pairs {
            let config = TradingPairConfig {
                liquidity: entry.liquidity,
                fee_rate_bps: entry.fee_rate_bps,
                last_updated_block: entry.last_updated_block,
                price_feed: SourceId(entry.price_feed),
                active: entry.active,
            };
            self.configure_trading_pair(
                caller,
                TokenId(entry.token_a),
                TokenId(entry.token_b),
                ExchangeId(entry.exchange),
                config,
            )
            .with_context(|| {
                format!(
                    "Failed to configure pair {}/{} on exchange {}",
                    entry.token_a, entry.token_b, entry.exchange
                )
            })?;
        }

        for entry in &scenario.feeds {
            let update = PriceUpdate {
                token_a: TokenId(entry.token_a),
                token_b: TokenId(entry.token_b),
                price: entry.price,
                block: entry.block.unwrap_or(current_block),
                source: SourceId(entry.source),
                volume_24h: entry.volume_24h,
                reliable: entry.reliable,
            };
            self.update_price_feed(caller, update).with_context(|| {
                format!(
                    "Failed to load feed {}/{} from source {}",
                    entry.token_a, entry.token_b, entry.source
                )
            })?;
        }

        info!(
            "Scenario loaded: {} exchanges, {} pairs, {} feeds, {} routes",
            self.exchanges.len(),
            self.pairs.len(),
            self.feeds.len(),
            scenario.routes.len()
        );
        Ok(())
    }
}
