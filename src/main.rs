//! Flash-Loan Arbitrage Bot (paper mode)
//!
//! Loads a TOML scenario (bot parameters, exchanges, pairs, feeds, routes),
//! scans every route at the given block, executes profitable opportunities
//! against the simulated backend and prints the per-period stats.
//!
//! Access roles come from the scenario's `[access]` section, overridden by
//! `OWNER_ADDRESS` / `ORACLE_ADDRESSES` (a `.env` file is honored).
//!
//! Usage:
//!   flasharb-bot --config config/flasharb.toml --block 100
//!   RUST_LOG=debug flasharb-bot --json-logs

use anyhow::{Context, Result};
use clap::Parser;
use flasharb_bot::config::{load_access_from_env, load_config_from_file, parse_principal};
use flasharb_bot::paper_trading::run_routes;
use flasharb_bot::types::period_for_block;
use flasharb_bot::FlashArbBot;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Flash-loan arbitrage bot, paper mode
#[derive(Parser)]
#[command(name = "flasharb-bot")]
struct Args {
    /// Scenario file (TOML)
    #[arg(short, long, env = "FLASHARB_CONFIG", default_value = "config/flasharb.toml")]
    config: PathBuf,

    /// Chain height the simulated backend starts at
    #[arg(short, long, env = "FLASHARB_BLOCK", default_value_t = 100)]
    block: u64,

    /// Executor address (defaults to the owner)
    #[arg(short, long, env = "EXECUTOR_ADDRESS")]
    executor: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the stats report as JSON on stdout
    #[arg(long)]
    json_report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    info!("Flash-Loan Arbitrage Bot starting (paper mode)");
    info!("Config file: {}", args.config.display());

    let scenario = load_config_from_file(&args.config)?;
    let access = load_access_from_env(scenario.access.clone())
        .resolve()
        .context("Failed to resolve access roles")?;
    let executor = match args.executor.as_deref() {
        Some(addr) => parse_principal(addr, "executor")?,
        None => access.owner,
    };

    info!(
        "Bot config: min profit {} | slippage {} bps | loan fee {} bps | gas limit {} | timeout {} blocks | max loan {}",
        scenario.bot.min_profit_threshold,
        scenario.bot.max_slippage_bps,
        scenario.bot.flash_loan_fee_bps,
        scenario.bot.gas_limit,
        scenario.bot.execution_timeout_blocks,
        scenario.bot.max_loan_amount
    );
    info!("Owner: {} | Oracles: {} | Executor: {}", access.owner, access.oracles.len(), executor);

    let (bot, backend) = FlashArbBot::paper(access.owner, scenario.bot.clone())
        .context("Failed to create bot")?;
    let block = backend.set_block(args.block);
    bot.load_scenario(access.owner, &scenario, &access.oracles).await?;

    let report = run_routes(&bot, executor, &scenario.routes)
        .await
        .context("Paper session failed")?;

    for (opportunity_id, reason) in &report.rejected {
        info!("Opportunity #{} rejected: [{}] {}", opportunity_id, reason.code(), reason);
    }
    info!(
        "Backend: {} commits, {} rollbacks | Total profit earned: {}",
        backend.commits(),
        backend.rollbacks(),
        bot.total_profit_earned()
    );
    info!("{}", bot.get_stats(period_for_block(block)).summary());

    if args.json_report {
        let periods = bot.stats_periods();
        println!("{}", serde_json::to_string_pretty(&periods)?);
    }

    Ok(())
}
