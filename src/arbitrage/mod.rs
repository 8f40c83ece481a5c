//! Arbitrage Module
//!
//! Opportunity detection, profit calculation, the flash loan lifecycle and
//! atomic execution through a transactional swap backend.

pub mod backend;
pub mod calculator;
pub mod detector;
pub mod executor;
pub mod flash_loan;
pub mod opportunities;

pub use backend::{SwapBackend, SwapFill, SwapLeg, SwapTransaction};
pub use calculator::{ProfitBreakdown, ProfitCalculator};
pub use detector::OpportunityDetector;
pub use executor::ExecutionEngine;
pub use flash_loan::FlashLoanManager;
pub use opportunities::{OpportunityBook, OpportunityClaim};
