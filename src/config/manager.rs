//! Bot Config Manager
//!
//! Single shared `BotConfig`. Updates are validated on a full copy and
//! swapped in under the write lock, so a rejected update leaves every field
//! untouched. Executions read one snapshot at start and keep it to the end.

use crate::error::Result;
use crate::types::BotConfig;
use serde::Deserialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Partial update. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BotConfigUpdate {
    pub enabled: Option<bool>,
    pub min_profit_threshold: Option<u128>,
    pub max_slippage_bps: Option<u32>,
    pub gas_limit: Option<u64>,
    pub flash_loan_fee_bps: Option<u32>,
    pub execution_timeout_blocks: Option<u64>,
    pub max_loan_amount: Option<u128>,
}

impl BotConfigUpdate {
    fn apply_to(&self, config: &mut BotConfig) {
        if let Some(v) = self.enabled {
            config.enabled = v;
        }
        if let Some(v) = self.min_profit_threshold {
            config.min_profit_threshold = v;
        }
        if let Some(v) = self.max_slippage_bps {
            config.max_slippage_bps = v;
        }
        if let Some(v) = self.gas_limit {
            config.gas_limit = v;
        }
        if let Some(v) = self.flash_loan_fee_bps {
            config.flash_loan_fee_bps = v;
        }
        if let Some(v) = self.execution_timeout_blocks {
            config.execution_timeout_blocks = v;
        }
        if let Some(v) = self.max_loan_amount {
            config.max_loan_amount = v;
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<BotConfig>>,
}

impl ConfigManager {
    /// Wrap a validated config
    pub fn new(config: BotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    // A panic while holding the lock cannot leave a half-applied config,
    // since writers only ever store a fully validated copy.
    fn read(&self) -> RwLockReadGuard<'_, BotConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BotConfig> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> BotConfig {
        self.read().clone()
    }

    /// Apply every field of `update` or none of them
    pub fn update(&self, update: &BotConfigUpdate) -> Result<BotConfig> {
        let mut guard = self.write();
        let mut candidate = guard.clone();
        update.apply_to(&mut candidate);
        candidate.validate()?;

        warn!(
            "Bot config updated: min profit {} | slippage {} bps | gas limit {} | loan fee {} bps | timeout {} blocks | max loan {} | enabled {}",
            candidate.min_profit_threshold,
            candidate.max_slippage_bps,
            candidate.gas_limit,
            candidate.flash_loan_fee_bps,
            candidate.execution_timeout_blocks,
            candidate.max_loan_amount,
            candidate.enabled
        );
        *guard = candidate.clone();
        Ok(candidate)
    }

    /// Blocks new executions only; attempts already running finish on their snapshot
    pub fn set_enabled(&self, enabled: bool) {
        self.write().enabled = enabled;
        if enabled {
            warn!("Bot ENABLED - executions accepted");
        } else {
            warn!("Bot DISABLED - new executions rejected");
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            config: Arc::new(RwLock::new(BotConfig::default())),
        }
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_initial_config() {
        let config = BotConfig {
            max_slippage_bps: 1_001,
            ..BotConfig::default()
        };
        assert_eq!(ConfigManager::new(config).unwrap_err().code(), "ERR-INVALID-AMOUNT");
    }

    #[test]
    fn test_partial_update() {
        let manager = ConfigManager::default();
        let updated = manager
            .update(&BotConfigUpdate {
                min_profit_threshold: Some(5),
                gas_limit: Some(900_000),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.min_profit_threshold, 5);
        assert_eq!(updated.gas_limit, 900_000);
        // Untouched fields keep their values
        assert_eq!(updated.flash_loan_fee_bps, 30);
        assert_eq!(manager.snapshot(), updated);
    }

    #[test]
    fn test_invalid_update_applies_nothing() {
        let manager = ConfigManager::default();
        let before = manager.snapshot();

        let err = manager
            .update(&BotConfigUpdate {
                min_profit_threshold: Some(1),
                flash_loan_fee_bps: Some(1_001),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "ERR-INVALID-AMOUNT");
        assert_eq!(manager.snapshot(), before);

        assert!(manager
            .update(&BotConfigUpdate {
                max_slippage_bps: Some(5_000),
                ..Default::default()
            })
            .is_err());
        assert_eq!(manager.snapshot(), before);
    }

    #[test]
    fn test_bounds_inclusive() {
        let manager = ConfigManager::default();
        assert!(manager
            .update(&BotConfigUpdate {
                max_slippage_bps: Some(1_000),
                flash_loan_fee_bps: Some(1_000),
                ..Default::default()
            })
            .is_ok());
    }

    #[test]
    fn test_set_enabled_shared_between_clones() {
        let manager = ConfigManager::default();
        let other = manager.clone();
        assert!(other.snapshot().enabled);

        manager.set_enabled(false);
        assert!(!other.snapshot().enabled);

        // A snapshot taken earlier is not affected
        let snapshot = other.snapshot();
        manager.set_enabled(true);
        assert!(!snapshot.enabled);
    }
}
