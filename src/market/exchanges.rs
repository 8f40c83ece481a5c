//! Exchange Registry
//!
//! Thread-safe storage for per-exchange configuration using DashMap.
//! Exchanges are never removed; `set_active(false)` takes one out of rotation.

use crate::error::{ArbError, Result};
use crate::types::{ensure_bps, Exchange, ExchangeConfig, ExchangeId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct ExchangeRegistry {
    exchanges: Arc<DashMap<ExchangeId, Exchange>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self {
            exchanges: Arc::new(DashMap::new()),
        }
    }

    /// Create or replace an exchange record. Bounds are checked before the write.
    pub fn configure(&self, id: ExchangeId, config: ExchangeConfig) -> Result<()> {
        ensure_bps(config.fee_rate_bps, "exchange fee rate")?;
        ensure_bps(config.max_slippage_bps, "exchange max slippage")?;

        let exchange = Exchange::from_config(id, config);
        info!(
            "Exchange configured: {} ({}) | fee {} bps | flash loans: {} | active: {}",
            exchange.name, id, exchange.fee_rate_bps, exchange.flash_loan_supported, exchange.active
        );
        self.exchanges.insert(id, exchange);
        Ok(())
    }

    /// Toggle the active flag without touching anything else
    pub fn set_active(&self, id: ExchangeId, active: bool) -> Result<()> {
        let mut entry = self
            .exchanges
            .get_mut(&id)
            .ok_or_else(|| ArbError::NotFound(format!("exchange {}", id)))?;
        entry.active = active;
        info!("Exchange {} ({}) active: {}", entry.name, id, active);
        Ok(())
    }

    pub fn get(&self, id: ExchangeId) -> Option<Exchange> {
        self.exchanges.get(&id).map(|entry| entry.clone())
    }

    /// Active and supports flash loans. Unknown exchanges are not usable.
    pub fn is_usable(&self, id: ExchangeId) -> bool {
        self.exchanges
            .get(&id)
            .map(|entry| entry.is_usable())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ExchangeRegistry {
    fn clone(&self) -> Self {
        Self {
            exchanges: Arc::clone(&self.exchanges),
        }
    }
}
