//! Core data structures
//!
//! Records held by the registries, the detector and the flash loan manager.
//! All monetary amounts are integer base units (`u128`); prices carry
//! `PRICE_DECIMALS` implied decimals.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArbError, Result};

/// Caller identity. Owner and oracle checks compare against stored principals.
pub type Principal = Address;

/// Fees and slippage are expressed out of this many basis points
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Upper bound for any configured fee rate or slippage (10%)
pub const MAX_FEE_BPS: u32 = 1_000;

/// Implied decimals of a `Price`
pub const PRICE_DECIMALS: u32 = 6;
pub const PRICE_SCALE: u128 = 1_000_000;

/// A feed older than this many blocks is stale
pub const FRESHNESS_WINDOW_BLOCKS: u64 = 10;

/// Blocks per stats period (~1 day at 10 min blocks)
pub const BLOCKS_PER_PERIOD: u64 = 144;

/// Stats period containing `block`
pub fn period_for_block(block: u64) -> u64 {
    block / BLOCKS_PER_PERIOD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeId(pub u32);

/// Oracle source a price feed is published under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "exchange#{}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Fixed-point price: units of token B per unit of token A, 6 implied decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(u128);

impl Price {
    /// Rejects a zero price
    pub fn new(raw: u128) -> Result<Self> {
        if raw == 0 {
            return Err(ArbError::InvalidAmount("price must be positive".into()));
        }
        Ok(Self(raw))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Human-readable value, e.g. 1_500_000 -> 1.500000
    pub fn as_decimal(&self) -> Decimal {
        match i128::try_from(self.0) {
            Ok(v) => Decimal::try_from_i128_with_scale(v, PRICE_DECIMALS).unwrap_or(Decimal::MAX),
            Err(_) => Decimal::MAX,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

/// Reject a basis-point value above `MAX_FEE_BPS`
pub fn ensure_bps(value: u32, what: &str) -> Result<()> {
    if value > MAX_FEE_BPS {
        return Err(ArbError::InvalidAmount(format!(
            "{} {} bps exceeds maximum {} bps",
            what, value, MAX_FEE_BPS
        )));
    }
    Ok(())
}

/// Admin-supplied exchange settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub name: String,
    pub contract_address: Address,
    pub router_address: Address,
    pub fee_rate_bps: u32,
    pub flash_loan_supported: bool,
    pub active: bool,
    /// Minimum pair liquidity for this exchange's pairs to be tradable
    pub liquidity_threshold: u128,
    pub max_slippage_bps: u32,
}

/// Exchange record. Never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub id: ExchangeId,
    pub name: String,
    pub contract_address: Address,
    pub router_address: Address,
    pub fee_rate_bps: u32,
    pub flash_loan_supported: bool,
    pub active: bool,
    pub liquidity_threshold: u128,
    pub max_slippage_bps: u32,
}

impl Exchange {
    pub fn from_config(id: ExchangeId, config: ExchangeConfig) -> Self {
        Self {
            id,
            name: config.name,
            contract_address: config.contract_address,
            router_address: config.router_address,
            fee_rate_bps: config.fee_rate_bps,
            flash_loan_supported: config.flash_loan_supported,
            active: config.active,
            liquidity_threshold: config.liquidity_threshold,
            max_slippage_bps: config.max_slippage_bps,
        }
    }

    /// Usable for flash arbitrage: active and supports flash loans
    pub fn is_usable(&self) -> bool {
        self.active && self.flash_loan_supported
    }
}

/// Admin-supplied trading pair settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPairConfig {
    pub liquidity: u128,
    pub fee_rate_bps: u32,
    pub last_updated_block: u64,
    /// Feed source pricing this pair on this exchange
    pub price_feed: SourceId,
    pub active: bool,
}

/// Trading pair state on one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub exchange: ExchangeId,
    pub exists: bool,
    pub liquidity: u128,
    pub fee_rate_bps: u32,
    pub last_updated_block: u64,
    pub price_feed: SourceId,
    pub active: bool,
}

/// Latest price sample for a pair from one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFeed {
    pub price: Price,
    pub last_updated_block: u64,
    pub source: SourceId,
    pub volume_24h: u128,
    pub reliable: bool,
}

impl PriceFeed {
    /// Fresh iff fewer than `FRESHNESS_WINDOW_BLOCKS` blocks have passed.
    /// A feed stamped after `current_block` is never fresh.
    pub fn is_fresh(&self, current_block: u64) -> bool {
        current_block
            .checked_sub(self.last_updated_block)
            .is_some_and(|age| age < FRESHNESS_WINDOW_BLOCKS)
    }

    /// Fresh and flagged reliable by the oracle
    pub fn is_usable(&self, current_block: u64) -> bool {
        self.reliable && self.is_fresh(current_block)
    }
}

/// Detected cross-exchange arbitrage candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    pub id: u64,
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub exchange_buy: ExchangeId,
    pub exchange_sell: ExchangeId,
    pub buy_price: Price,
    pub sell_price: Price,
    /// Gross estimate: floor(loan_amount * diff_bps / 10000)
    pub profit_estimate: u128,
    pub loan_amount: u128,
    pub gas_estimate: u64,
    pub created_at_block: u64,
    pub expires_at_block: u64,
    pub executed: bool,
    pub profitable: bool,
    /// Pair fee rates captured at detection time
    pub buy_fee_bps: u32,
    pub sell_fee_bps: u32,
    pub diff_bps: u128,
}

impl Opportunity {
    pub fn is_expired(&self, current_block: u64) -> bool {
        current_block > self.expires_at_block
    }
}

/// Flash loan lifecycle. No record (or a settled one) means no active loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Repaid,
    ForceRepaid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLoan {
    pub loan_amount: u128,
    pub token: TokenId,
    pub borrowed_at_block: u64,
    pub expires_at_block: u64,
    pub status: LoanStatus,
    pub arbitrage_id: u64,
    pub fee_paid: u128,
}

impl FlashLoan {
    pub fn repaid(&self) -> bool {
        self.status != LoanStatus::Active
    }

    pub fn is_expired(&self, current_block: u64) -> bool {
        current_block > self.expires_at_block
    }
}

/// Outcome of one committed execution. Append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub id: u64,
    pub opportunity_id: u64,
    pub executor: Principal,
    pub loan_amount: u128,
    pub profit_realized: u128,
    pub gas_used: u64,
    pub execution_time_block: u64,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Process-wide bot parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub enabled: bool,
    pub min_profit_threshold: u128,
    pub max_slippage_bps: u32,
    pub gas_limit: u64,
    pub flash_loan_fee_bps: u32,
    pub execution_timeout_blocks: u64,
    pub max_loan_amount: u128,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_profit_threshold: 1_000_000,
            max_slippage_bps: 300,
            gas_limit: 2_000_000,
            flash_loan_fee_bps: 30,
            execution_timeout_blocks: 10,
            max_loan_amount: 10_000_000_000_000,
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_bps(self.max_slippage_bps, "max slippage")?;
        ensure_bps(self.flash_loan_fee_bps, "flash loan fee")?;
        Ok(())
    }
}
