//! Paper Trading Module
//!
//! Dry-run execution against the in-memory `SimulatedBackend`. A paper
//! session scans every configured route once at the backend's current block,
//! executes the opportunities whose estimate clears the profit threshold, and
//! reports what happened. Nothing leaves the process.

pub mod simulator;

pub use simulator::{ExchangeVolume, SimulatedBackend};

use crate::bot::FlashArbBot;
use crate::config::RouteEntry;
use crate::error::{ArbError, Result};
use crate::types::{ExchangeId, ExecutionRecord, Principal, TokenId};
use tracing::{debug, info, warn};

/// Outcome of one pass over the routes
#[derive(Debug, Default)]
pub struct PaperReport {
    /// Routes that produced no opportunity
    pub routes_skipped: usize,
    pub opportunities_detected: usize,
    /// Detected, but the estimate did not clear the threshold
    pub unprofitable_estimates: usize,
    pub executed: Vec<ExecutionRecord>,
    /// Opportunity id and the reason execution failed
    pub rejected: Vec<(u64, ArbError)>,
}

impl PaperReport {
    pub fn total_profit(&self) -> u128 {
        self.executed
            .iter()
            .fold(0u128, |acc, r| acc.saturating_add(r.profit_realized))
    }

    /// Generate a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "{} routes skipped | {} detected ({} below threshold) | {} executed | {} rejected | profit {}",
            self.routes_skipped,
            self.opportunities_detected,
            self.unprofitable_estimates,
            self.executed.len(),
            self.rejected.len(),
            self.total_profit()
        )
    }
}

/// Scan `routes` and execute profitable opportunities as `executor`
pub async fn run_routes(bot: &FlashArbBot, executor: Principal, routes: &[RouteEntry]) -> Result<PaperReport> {
    let block = bot.current_block().await?;
    info!("[PAPER] Scanning {} routes @ block {}", routes.len(), block);
    let mut report = PaperReport::default();

    for route in routes {
        let detected = bot.detect_opportunity(
            TokenId(route.token_a),
            TokenId(route.token_b),
            ExchangeId(route.exchange_1),
            ExchangeId(route.exchange_2),
            route.amount,
        )
        .await?;

        let opportunity = match detected {
            Some(opportunity) => opportunity,
            None => {
                report.routes_skipped += 1;
                continue;
            }
        };
        report.opportunities_detected += 1;

        if !opportunity.profitable {
            debug!(
                "[PAPER] Opportunity #{} estimate {} below threshold, not executing",
                opportunity.id, opportunity.profit_estimate
            );
            report.unprofitable_estimates += 1;
            continue;
        }

        match bot.execute_arbitrage(executor, opportunity.id).await {
            Ok(record) => report.executed.push(record),
            Err(e) => {
                warn!("[PAPER] Opportunity #{} rejected: {}", opportunity.id, e);
                report.rejected.push((opportunity.id, e));
            }
        }
    }

    info!("[PAPER] {}", report.summary());
    Ok(report)
}
