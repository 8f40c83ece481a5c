//! Configuration management
//!
//! Scenario files (TOML) describe the bot parameters, the access roles and the
//! market to load: exchanges, trading pairs, price feeds and the routes to scan.
//! Access roles can be overridden from the environment (`.env` supported).

pub mod manager;

pub use crate::types::BotConfig;
pub use manager::{BotConfigUpdate, ConfigManager};

use crate::types::Principal;
use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Top-level scenario file
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default, rename = "exchange")]
    pub exchanges: Vec<ExchangeEntry>,
    #[serde(default, rename = "pair")]
    pub pairs: Vec<PairEntry>,
    #[serde(default, rename = "feed")]
    pub feeds: Vec<FeedEntry>,
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteEntry>,
}

/// Owner and oracle principals as hex addresses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    pub owner: Option<String>,
    #[serde(default)]
    pub oracles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub owner: Principal,
    pub oracles: Vec<Principal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeEntry {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub router_address: Option<String>,
    pub fee_rate_bps: u32,
    #[serde(default = "default_true")]
    pub flash_loan_supported: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub liquidity_threshold: u128,
    #[serde(default = "default_exchange_slippage")]
    pub max_slippage_bps: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairEntry {
    pub token_a: u32,
    pub token_b: u32,
    pub exchange: u32,
    pub liquidity: u128,
    pub fee_rate_bps: u32,
    #[serde(default)]
    pub last_updated_block: u64,
    /// Feed source pricing this pair
    pub price_feed: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub token_a: u32,
    pub token_b: u32,
    pub source: u32,
    /// 6 implied decimals
    pub price: u128,
    /// Defaults to the block the scenario runs at
    pub block: Option<u64>,
    #[serde(default)]
    pub volume_24h: u128,
    #[serde(default = "default_true")]
    pub reliable: bool,
}

/// Token pair and exchange pair to scan, with the loan size to try
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub token_a: u32,
    pub token_b: u32,
    pub exchange_1: u32,
    pub exchange_2: u32,
    pub amount: u128,
}

fn default_true() -> bool { true }
fn default_exchange_slippage() -> u32 { 500 }

/// Parse a hex address, naming the setting on failure
pub fn parse_principal(value: &str, what: &str) -> Result<Principal> {
    Address::from_str(value.trim()).with_context(|| format!("Invalid {} address: {}", what, value))
}

/// Parse an optional hex address, zero when absent
pub fn parse_optional_address(value: Option<&str>, what: &str) -> Result<Address> {
    match value {
        Some(v) => parse_principal(v, what),
        None => Ok(Address::ZERO),
    }
}

impl AccessConfig {
    pub fn resolve(&self) -> Result<ResolvedAccess> {
        let owner = self
            .owner
            .as_deref()
            .context("Owner address not configured (set [access].owner or OWNER_ADDRESS)")?;
        let owner = parse_principal(owner, "owner")?;

        let oracles = self
            .oracles
            .iter()
            .map(|o| parse_principal(o, "oracle"))
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedAccess { owner, oracles })
    }
}

/// Load a scenario from a TOML file and validate the bot parameters
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<ScenarioConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> Result<ScenarioConfig> {
    let config: ScenarioConfig =
        toml::from_str(content).context("Failed to parse TOML configuration")?;
    config.bot.validate().context("Invalid [bot] section")?;
    Ok(config)
}

/// Override access roles from the environment.
///
/// `OWNER_ADDRESS` replaces the owner; `ORACLE_ADDRESSES` (comma separated)
/// replaces the oracle list. A `.env` file is loaded first if present.
pub fn load_access_from_env(access: AccessConfig) -> AccessConfig {
    dotenv::dotenv().ok();
    apply_access_overrides(
        access,
        std::env::var("OWNER_ADDRESS").ok(),
        std::env::var("ORACLE_ADDRESSES").ok(),
    )
}

fn apply_access_overrides(
    mut access: AccessConfig,
    owner: Option<String>,
    oracles: Option<String>,
) -> AccessConfig {
    if let Some(owner) = owner.filter(|o| !o.trim().is_empty()) {
        access.owner = Some(owner);
    }
    if let Some(oracles) = oracles {
        access.oracles = oracles
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }
    access
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
[bot]
min_profit_threshold = 1000000
flash_loan_fee_bps = 30

[access]
owner = "0x1111111111111111111111111111111111111111"
oracles = ["0x2222222222222222222222222222222222222222"]

[[exchange]]
id = 1
name = "ALEX"
fee_rate_bps = 30
liquidity_threshold = 1000000000000

[[exchange]]
id = 2
name = "ARKADIKO"
fee_rate_bps = 25
flash_loan_supported = true
liquidity_threshold = 1000000000000

[[pair]]
token_a = 1
token_b = 2
exchange = 1
liquidity = 5000000000000
fee_rate_bps = 30
price_feed = 1

[[feed]]
token_a = 1
token_b = 2
source = 1
price = 1500000

[[route]]
token_a = 1
token_b = 2
exchange_1 = 1
exchange_2 = 2
amount = 1000000000
"#;

    #[test]
    fn test_parse_scenario() {
        let config = parse_scenario(SCENARIO).unwrap();

        // Unset bot fields fall back to defaults
        assert_eq!(config.bot.min_profit_threshold, 1_000_000);
        assert_eq!(config.bot.gas_limit, 2_000_000);
        assert!(config.bot.enabled);

        assert_eq!(config.exchanges.len(), 2);
        assert_eq!(config.exchanges[0].name, "ALEX");
        assert!(config.exchanges[0].flash_loan_supported);
        assert_eq!(config.exchanges[0].max_slippage_bps, 500);
        assert_eq!(config.pairs[0].liquidity, 5_000_000_000_000);
        assert!(config.feeds[0].reliable);
        assert_eq!(config.feeds[0].block, None);
        assert_eq!(config.routes[0].amount, 1_000_000_000);
    }

    #[test]
    fn test_invalid_bot_section_rejected() {
        let err = parse_scenario("[bot]\nmax_slippage_bps = 2000\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid [bot] section"));
    }

    #[test]
    fn test_resolve_access() {
        let config = parse_scenario(SCENARIO).unwrap();
        let access = config.access.resolve().unwrap();
        assert_eq!(access.owner, Address::repeat_byte(0x11));
        assert_eq!(access.oracles, vec![Address::repeat_byte(0x22)]);

        assert!(AccessConfig::default().resolve().is_err());
        let bad = AccessConfig {
            owner: Some("not-an-address".into()),
            oracles: vec![],
        };
        assert!(bad.resolve().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let access = AccessConfig {
            owner: Some("0x1111111111111111111111111111111111111111".into()),
            oracles: vec!["0x2222222222222222222222222222222222222222".into()],
        };
        let overridden = apply_access_overrides(
            access.clone(),
            Some("0x3333333333333333333333333333333333333333".into()),
            Some(" 0x4444444444444444444444444444444444444444 , ".into()),
        );
        let resolved = overridden.resolve().unwrap();
        assert_eq!(resolved.owner, Address::repeat_byte(0x33));
        assert_eq!(resolved.oracles, vec![Address::repeat_byte(0x44)]);

        let untouched = apply_access_overrides(access, None, None);
        assert_eq!(untouched.resolve().unwrap().owner, Address::repeat_byte(0x11));
    }
}
