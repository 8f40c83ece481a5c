//! Opportunity Book
//!
//! Owns detected opportunities and their id sequence. Ids are allocated
//! exactly once per created opportunity, starting at 1, and never reused.
//!
//! Execution takes a claim on an opportunity for the duration of the attempt.
//! The claim is released on drop, so a rolled-back attempt leaves the
//! opportunity executable again.

use crate::error::{ArbError, Result};
use crate::types::Opportunity;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct OpportunityBook {
    opportunities: Arc<DashMap<u64, Opportunity>>,
    next_id: Arc<AtomicU64>,
    in_flight: Arc<DashSet<u64>>,
}

impl OpportunityBook {
    pub fn new() -> Self {
        Self {
            opportunities: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Allocate the next id and store the opportunity built for it.
    /// Call only once every validation has passed.
    pub fn insert<F>(&self, build: F) -> Opportunity
    where
        F: FnOnce(u64) -> Opportunity,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let opportunity = build(id);
        self.opportunities.insert(id, opportunity.clone());
        opportunity
    }

    pub fn get(&self, id: u64) -> Option<Opportunity> {
        self.opportunities.get(&id).map(|entry| entry.clone())
    }

    /// Claim an opportunity for execution.
    ///
    /// Fails with NotFound, then Expired (`current_block > expires_at_block`),
    /// then AlreadyExecuted. An opportunity already claimed by a concurrent
    /// attempt also reports AlreadyExecuted.
    pub fn claim(&self, id: u64, current_block: u64) -> Result<OpportunityClaim> {
        if !self.in_flight.insert(id) {
            debug!("Opportunity {} is already being executed", id);
            return Err(ArbError::AlreadyExecuted(id));
        }
        // From here the guard releases the claim on every early return
        let guard = ClaimGuard {
            in_flight: Arc::clone(&self.in_flight),
            id,
        };

        let opportunity = self
            .get(id)
            .ok_or_else(|| ArbError::NotFound(format!("opportunity {}", id)))?;

        if opportunity.is_expired(current_block) {
            return Err(ArbError::Expired {
                expires_at: opportunity.expires_at_block,
                current_block,
            });
        }
        if opportunity.executed {
            return Err(ArbError::AlreadyExecuted(id));
        }

        Ok(OpportunityClaim {
            opportunity,
            _guard: guard,
        })
    }

    /// Flip `executed` to true. It never goes back.
    pub fn mark_executed(&self, id: u64) -> Result<()> {
        let mut entry = self
            .opportunities
            .get_mut(&id)
            .ok_or_else(|| ArbError::NotFound(format!("opportunity {}", id)))?;
        if entry.executed {
            return Err(ArbError::AlreadyExecuted(id));
        }
        entry.executed = true;
        Ok(())
    }

    /// Id the next created opportunity will receive
    pub fn peek_next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// All opportunities ordered by id
    pub fn all(&self) -> Vec<Opportunity> {
        let mut all: Vec<Opportunity> = self.opportunities.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|o| o.id);
        all
    }

    pub fn len(&self) -> usize {
        self.opportunities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }
}

impl Default for OpportunityBook {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for OpportunityBook {
    fn clone(&self) -> Self {
        Self {
            opportunities: Arc::clone(&self.opportunities),
            next_id: Arc::clone(&self.next_id),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

#[derive(Debug)]
struct ClaimGuard {
    in_flight: Arc<DashSet<u64>>,
    id: u64,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Exclusive right to execute one opportunity. Snapshot taken at claim time.
#[derive(Debug)]
pub struct OpportunityClaim {
    pub opportunity: Opportunity,
    _guard: ClaimGuard,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExchangeId, Price, TokenId};
    use std::collections::HashSet;

    fn build(id: u64) -> Opportunity {
        Opportunity {
            id,
            token_a: TokenId(1),
            token_b: TokenId(2),
            exchange_buy: ExchangeId(1),
            exchange_sell: ExchangeId(2),
            buy_price: Price::new(1_500_000).unwrap(),
            sell_price: Price::new(1_600_000).unwrap(),
            profit_estimate: 66_600_000,
            loan_amount: 1_000_000_000,
            gas_estimate: 601_000,
            created_at_block: 100,
            expires_at_block: 110,
            executed: false,
            profitable: true,
            buy_fee_bps: 30,
            sell_fee_bps: 25,
            diff_bps: 666,
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increment() {
        let book = OpportunityBook::new();
        assert_eq!(book.peek_next_id(), 1);
        assert_eq!(book.insert(build).id, 1);
        assert_eq!(book.insert(build).id, 2);
        assert_eq!(book.insert(build).id, 3);
        assert_eq!(book.peek_next_id(), 4);
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_concurrent_ids_unique() {
        let book = OpportunityBook::new();
        let ids: Vec<u64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let book = book.clone();
                    s.spawn(move || (0..50).map(|_| book.insert(build).id).collect::<Vec<_>>())
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 400);
        assert_eq!(*unique.iter().min().unwrap(), 1);
        assert_eq!(*unique.iter().max().unwrap(), 400);
    }

    #[test]
    fn test_claim_errors_in_order() {
        let book = OpportunityBook::new();
        assert_eq!(book.claim(1, 100).unwrap_err().code(), "ERR-NOT-FOUND");

        book.insert(build);
        // Expiry is inclusive of the expiry block
        assert!(book.claim(1, 110).is_ok());
        assert_eq!(book.claim(1, 111).unwrap_err().code(), "ERR-EXPIRED");

        book.mark_executed(1).unwrap();
        assert_eq!(book.claim(1, 105).unwrap_err().code(), "ERR-ALREADY-EXECUTED");
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let book = OpportunityBook::new();
        book.insert(build);

        let claim = book.claim(1, 100).unwrap();
        assert_eq!(claim.opportunity.id, 1);
        assert_eq!(book.claim(1, 100).unwrap_err().code(), "ERR-ALREADY-EXECUTED");

        drop(claim);
        assert!(book.claim(1, 100).is_ok());
    }

    #[test]
    fn test_failed_claim_releases() {
        let book = OpportunityBook::new();
        book.insert(build);
        assert!(book.claim(1, 200).is_err());
        // Expired check failed after the claim was taken; it must not linger
        assert!(book.claim(1, 100).is_ok());
    }

    #[test]
    fn test_mark_executed_once() {
        let book = OpportunityBook::new();
        book.insert(build);
        book.mark_executed(1).unwrap();
        assert!(book.get(1).unwrap().executed);
        assert_eq!(book.mark_executed(1).unwrap_err().code(), "ERR-ALREADY-EXECUTED");
        assert_eq!(book.mark_executed(9).unwrap_err().code(), "ERR-NOT-FOUND");
    }
}
