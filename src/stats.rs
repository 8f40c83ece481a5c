//! Execution Statistics
//!
//! Per-period execution counters and the append-only execution history.
//! A period is `floor(block / 144)`. Every update is additive; derived fields
//! are recomputed from the totals after each change.

use crate::types::ExecutionRecord;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one stats period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsPeriod {
    pub period: u64,

    // Attempts
    /// Committed executions plus rolled-back attempts
    pub total_executions: u64,
    pub successful_executions: u64,

    // Totals over committed executions
    pub total_volume: u128,
    pub total_profit: u128,
    /// total_profit / total_executions, zero when there were no executions
    pub average_profit: u128,
    pub gas_consumed: u64,

    // Opportunity tracking
    pub opportunities_found: u64,
    pub opportunities_executed: u64,
}

impl StatsPeriod {
    pub fn new(period: u64) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    fn recalculate_average(&mut self) {
        self.average_profit = if self.total_executions > 0 {
            self.total_profit / self.total_executions as u128
        } else {
            0
        };
    }

    /// Successful share of all attempts, in percent
    pub fn success_rate(&self) -> Decimal {
        if self.total_executions == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.successful_executions) * Decimal::ONE_HUNDRED
            / Decimal::from(self.total_executions))
        .round_dp(1)
    }

    /// Generate a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "Period {}: {} executions ({} ok, {}%) | Opportunities: {} found, {} executed | Volume: {} | Profit: {} (avg {}) | Gas: {}",
            self.period,
            self.total_executions,
            self.successful_executions,
            self.success_rate(),
            self.opportunities_found,
            self.opportunities_executed,
            self.total_volume,
            self.total_profit,
            self.average_profit,
            self.gas_consumed
        )
    }
}

#[derive(Debug)]
pub struct StatsTracker {
    periods: Arc<DashMap<u64, StatsPeriod>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            periods: Arc::new(DashMap::new()),
        }
    }

    /// Fold a committed execution into its period
    pub fn record(&self, period: u64, execution: &ExecutionRecord) {
        let mut stats = self
            .periods
            .entry(period)
            .or_insert_with(|| StatsPeriod::new(period));

        stats.total_executions += 1;
        if execution.success {
            stats.successful_executions += 1;
            stats.opportunities_executed += 1;
        }
        stats.total_volume = stats.total_volume.saturating_add(execution.loan_amount);
        stats.total_profit = stats.total_profit.saturating_add(execution.profit_realized);
        stats.gas_consumed = stats.gas_consumed.saturating_add(execution.gas_used);
        stats.recalculate_average();
    }

    /// Count an attempt that rolled back. Only the attempt counter moves.
    pub fn record_failed_attempt(&self, period: u64) {
        let mut stats = self
            .periods
            .entry(period)
            .or_insert_with(|| StatsPeriod::new(period));
        stats.total_executions += 1;
        stats.recalculate_average();
    }

    pub fn record_opportunity_found(&self, period: u64) {
        self.periods
            .entry(period)
            .or_insert_with(|| StatsPeriod::new(period))
            .opportunities_found += 1;
    }

    /// Stats for `period`, all zeros if nothing was recorded
    pub fn get(&self, period: u64) -> StatsPeriod {
        self.periods
            .get(&period)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| StatsPeriod::new(period))
    }

    /// Every recorded period, oldest first
    pub fn periods(&self) -> Vec<StatsPeriod> {
        let mut all: Vec<StatsPeriod> = self.periods.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|p| p.period);
        all
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StatsTracker {
    fn clone(&self) -> Self {
        Self {
            periods: Arc::clone(&self.periods),
        }
    }
}

/// Append-only log of committed executions. Ids start at 1.
#[derive(Debug)]
pub struct ExecutionHistory {
    records: Arc<DashMap<u64, ExecutionRecord>>,
    next_id: Arc<AtomicU64>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next record id and store the record built for it
    pub fn append<F>(&self, build: F) -> ExecutionRecord
    where
        F: FnOnce(u64) -> ExecutionRecord,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = build(id);
        self.records.insert(id, record.clone());
        record
    }

    pub fn get(&self, id: u64) -> Option<ExecutionRecord> {
        self.records.get(&id).map(|entry| entry.clone())
    }

    /// Records ordered by id
    pub fn all(&self) -> Vec<ExecutionRecord> {
        let mut all: Vec<ExecutionRecord> = self.records.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|r| r.id);
        all
    }

    /// Sum of realized profit across every committed execution
    pub fn total_profit_earned(&self) -> u128 {
        self.records
            .iter()
            .fold(0u128, |acc, r| acc.saturating_add(r.profit_realized))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExecutionHistory {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            next_id: Arc::clone(&self.next_id),
        }
    }
}
