//! Error Types
//!
//! Every failure the engine can report to a caller. Each variant maps to a
//! stable `ERR-*` code so callers outside Rust can match on it.
//!
//! Validation errors are always raised before any state is touched.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbError {
    /// Fee, slippage or amount outside configured bounds, or arithmetic overflow
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Non-owner invoking an admin operation, or non-oracle pushing a price
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("stale price feed: last updated at block {last_updated}, current block {current_block}")]
    StalePrice { last_updated: u64, current_block: u64 },

    #[error("insufficient liquidity: {available} < {required}")]
    InsufficientLiquidity { available: u128, required: u128 },

    #[error("borrower already has an active flash loan")]
    AlreadyActiveLoan,

    #[error("expired at block {expires_at}, current block {current_block}")]
    Expired { expires_at: u64, current_block: u64 },

    #[error("opportunity {0} already executed")]
    AlreadyExecuted(u64),

    #[error("unprofitable: net profit {net_profit} <= threshold {threshold}")]
    Unprofitable { net_profit: u128, threshold: u128 },

    #[error("flash loan already repaid")]
    AlreadyRepaid,

    #[error("bot is disabled")]
    BotDisabled,

    /// Force repayment attempted before the loan's expiry block has passed
    #[error("flash loan not expired: expires at block {expires_at}, current block {current_block}")]
    LoanNotExpired { expires_at: u64, current_block: u64 },

    /// Swap backend refused or failed a leg, or failed to commit
    #[error("swap backend error: {0}")]
    Backend(String),
}

impl ArbError {
    /// Stable error code.
    ///
    /// Two codes extend the core `ERR-*` set and are specific to this crate:
    /// `ERR-NOT-EXPIRED` (force repay before the loan's expiry block) and
    /// `ERR-BACKEND` (the swap backend refused a swap or commit, or could not
    /// report the block height). Callers matching only the core set should
    /// treat both as opaque failures.
    pub fn code(&self) -> &'static str {
        match self {
            ArbError::InvalidAmount(_) => "ERR-INVALID-AMOUNT",
            ArbError::NotFound(_) => "ERR-NOT-FOUND",
            ArbError::Unauthorized(_) => "ERR-UNAUTHORIZED",
            ArbError::StalePrice { .. } => "ERR-STALE-PRICE",
            ArbError::InsufficientLiquidity { .. } => "ERR-INSUFFICIENT-LIQUIDITY",
            ArbError::AlreadyActiveLoan => "ERR-ALREADY-ACTIVE-LOAN",
            ArbError::Expired { .. } => "ERR-EXPIRED",
            ArbError::AlreadyExecuted(_) => "ERR-ALREADY-EXECUTED",
            ArbError::Unprofitable { .. } => "ERR-UNPROFITABLE",
            ArbError::AlreadyRepaid => "ERR-ALREADY-REPAID",
            ArbError::BotDisabled => "ERR-BOT-DISABLED",
            ArbError::LoanNotExpired { .. } => "ERR-NOT-EXPIRED",
            ArbError::Backend(_) => "ERR-BACKEND",
        }
    }

    /// True for outcomes a caller may retry after a fresh detection
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArbError::Unprofitable { .. }
                | ArbError::Backend(_)
                | ArbError::StalePrice { .. }
                | ArbError::InsufficientLiquidity { .. }
        )
    }

    pub(crate) fn overflow(what: &str) -> Self {
        ArbError::InvalidAmount(format!("arithmetic overflow computing {}", what))
    }
}

/// Result type alias using ArbError
pub type Result<T> = std::result::Result<T, ArbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_documented_kinds() {
        assert_eq!(ArbError::InvalidAmount("fee".into()).code(), "ERR-INVALID-AMOUNT");
        assert_eq!(ArbError::NotFound("loan".into()).code(), "ERR-NOT-FOUND");
        assert_eq!(ArbError::AlreadyActiveLoan.code(), "ERR-ALREADY-ACTIVE-LOAN");
        assert_eq!(ArbError::AlreadyRepaid.code(), "ERR-ALREADY-REPAID");
        assert_eq!(ArbError::BotDisabled.code(), "ERR-BOT-DISABLED");
        assert_eq!(
            ArbError::Unprofitable { net_profit: 0, threshold: 1 }.code(),
            "ERR-UNPROFITABLE"
        );
    }

    #[test]
    fn test_crate_specific_codes() {
        let err = ArbError::LoanNotExpired { expires_at: 101, current_block: 100 };
        assert_eq!(err.code(), "ERR-NOT-EXPIRED");
        assert!(!err.is_recoverable());
        assert_eq!(ArbError::Backend("commit rejected".into()).code(), "ERR-BACKEND");
    }

    #[test]
    fn test_display_includes_context() {
        let err = ArbError::StalePrice { last_updated: 80, current_block: 100 };
        let msg = err.to_string();
        assert!(msg.contains("80"), "Got: {}", msg);
        assert!(msg.contains("100"), "Got: {}", msg);
    }

    #[test]
    fn test_unprofitable_is_recoverable() {
        assert!(ArbError::Unprofitable { net_profit: 5, threshold: 10 }.is_recoverable());
        assert!(!ArbError::Unauthorized("not owner".into()).is_recoverable());
        assert!(!ArbError::AlreadyExecuted(1).is_recoverable());
    }
}
