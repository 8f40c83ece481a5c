//! Flash Loan Manager
//!
//! Per-borrower loan lifecycle:
//!
//! ```text
//! NONE -> ACTIVE -> { REPAID | FORCE_REPAID } -> NONE
//! ```
//!
//! A settled record stays visible until the borrower's next `initiate`
//! replaces it. At most one active loan exists per borrower; `initiate`
//! enforces this with an atomic check-and-insert on the borrower's entry.

use crate::error::{ArbError, Result};
use crate::types::{BotConfig, FlashLoan, LoanStatus, Principal, TokenId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct FlashLoanManager {
    loans: Arc<DashMap<Principal, FlashLoan>>,
}

impl FlashLoanManager {
    pub fn new() -> Self {
        Self {
            loans: Arc::new(DashMap::new()),
        }
    }

    /// Open a loan for `borrower`. Returns the settled record it replaced, if any,
    /// so a rolled-back execution can put it back with `restore`.
    pub fn initiate(
        &self,
        borrower: Principal,
        token: TokenId,
        amount: u128,
        current_block: u64,
        config: &BotConfig,
        arbitrage_id: u64,
    ) -> Result<Option<FlashLoan>> {
        if amount == 0 {
            return Err(ArbError::InvalidAmount("loan amount must be positive".into()));
        }
        if amount > config.max_loan_amount {
            return Err(ArbError::InvalidAmount(format!(
                "loan amount {} exceeds maximum {}",
                amount, config.max_loan_amount
            )));
        }
        let expires_at_block = current_block
            .checked_add(config.execution_timeout_blocks)
            .ok_or_else(|| ArbError::overflow("loan expiry block"))?;

        let loan = FlashLoan {
            loan_amount: amount,
            token,
            borrowed_at_block: current_block,
            expires_at_block,
            status: LoanStatus::Active,
            arbitrage_id,
            fee_paid: 0,
        };

        let previous = match self.loans.entry(borrower) {
            Entry::Occupied(mut entry) => {
                if entry.get().status == LoanStatus::Active {
                    debug!("Borrower {} already has an active loan", borrower);
                    return Err(ArbError::AlreadyActiveLoan);
                }
                Some(entry.insert(loan))
            }
            Entry::Vacant(entry) => {
                entry.insert(loan);
                None
            }
        };

        info!(
            "Flash loan initiated: {} borrows {} of {} @ block {} (expires {}) for opportunity {}",
            borrower, amount, token, current_block, expires_at_block, arbitrage_id
        );
        Ok(previous)
    }

    /// Settle the borrower's active loan, recording the fee paid on top of principal
    pub fn repay(&self, borrower: Principal, fee: u128) -> Result<FlashLoan> {
        let mut entry = self
            .loans
            .get_mut(&borrower)
            .filter(|loan| loan.status == LoanStatus::Active)
            .ok_or_else(|| ArbError::NotFound(format!("active flash loan for {}", borrower)))?;

        entry.status = LoanStatus::Repaid;
        entry.fee_paid = fee;
        info!(
            "Flash loan repaid: {} returned {} + fee {}",
            borrower, entry.loan_amount, fee
        );
        Ok(entry.clone())
    }

    /// Close an expired loan on the borrower's behalf. Open to any caller once
    /// `current_block > expires_at_block`.
    pub fn force_repay(&self, borrower: Principal, current_block: u64) -> Result<FlashLoan> {
        let mut entry = self
            .loans
            .get_mut(&borrower)
            .ok_or_else(|| ArbError::NotFound(format!("flash loan for {}", borrower)))?;

        if entry.repaid() {
            return Err(ArbError::AlreadyRepaid);
        }
        if !entry.is_expired(current_block) {
            return Err(ArbError::LoanNotExpired {
                expires_at: entry.expires_at_block,
                current_block,
            });
        }

        entry.status = LoanStatus::ForceRepaid;
        warn!(
            "Flash loan force-repaid: {} ({} of {}) expired at block {}, now {}",
            borrower, entry.loan_amount, entry.token, entry.expires_at_block, current_block
        );
        Ok(entry.clone())
    }

    /// Undo an `initiate` for opportunity `arbitrage_id`. Only touches the entry
    /// if it is still the active loan that initiate created.
    pub fn restore(&self, borrower: Principal, previous: Option<FlashLoan>, arbitrage_id: u64) {
        if let Entry::Occupied(mut entry) = self.loans.entry(borrower) {
            let ours = entry.get().status == LoanStatus::Active
                && entry.get().arbitrage_id == arbitrage_id;
            if !ours {
                return;
            }
            match previous {
                Some(loan) => {
                    entry.insert(loan);
                }
                None => {
                    entry.remove();
                }
            }
            debug!("Flash loan for {} rolled back (opportunity {})", borrower, arbitrage_id);
        }
    }

    pub fn get(&self, borrower: Principal) -> Option<FlashLoan> {
        self.loans.get(&borrower).map(|entry| entry.clone())
    }

    pub fn has_active_loan(&self, borrower: Principal) -> bool {
        self.loans
            .get(&borrower)
            .map(|loan| loan.status == LoanStatus::Active)
            .unwrap_or(false)
    }
}

impl Default for FlashLoanManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FlashLoanManager {
    fn clone(&self) -> Self {
        Self {
            loans: Arc::clone(&self.loans),
        }
    }
}
