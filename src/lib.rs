//! Flash-Loan Arbitrage Bot Library
//!
//! Detects cross-exchange price discrepancies for a token pair, borrows the
//! trade size as a flash loan, buys low and sells high through a
//! transactional swap backend, repays the loan and records the outcome.
//! Unprofitable or failed executions roll back completely.

pub mod arbitrage;
pub mod bot;
pub mod config;
pub mod error;
pub mod market;
pub mod paper_trading;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use arbitrage::{ExecutionEngine, OpportunityDetector, ProfitCalculator, SwapBackend};
pub use bot::FlashArbBot;
pub use config::{load_config_from_file, BotConfigUpdate, ScenarioConfig};
pub use error::{ArbError, Result};
pub use market::PriceUpdate;
pub use stats::StatsPeriod;
pub use types::{BotConfig, ExchangeId, Opportunity, Principal, SourceId, TokenId};
