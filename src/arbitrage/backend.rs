//! Swap Backend
//!
//! Seam to the ledger that actually performs swaps. A backend opens a
//! transaction per execution; the engine commits it only after the realized
//! profit clears the threshold and rolls it back otherwise, so either every
//! swap of an execution lands or none does.
//!
//! The backend is also the source of the current block height. Expiry,
//! freshness and force-repay checks all read it from here.

use crate::error::Result;
use crate::types::{ExchangeId, TokenId};
use async_trait::async_trait;

/// One swap instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLeg {
    pub exchange: ExchangeId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: u128,
    /// Fill below this is refused (slippage guard)
    pub min_amount_out: u128,
    /// Pair fee rate captured at detection time
    pub fee_bps: u32,
}

/// Result of a filled swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapFill {
    pub amount_out: u128,
    pub gas_used: u64,
}

#[async_trait]
pub trait SwapBackend: Send + Sync {
    /// Height of the chain the backend executes against
    async fn current_block(&self) -> Result<u64>;

    /// Open a transaction against the ledger state at `block`
    async fn begin(&self, block: u64) -> Result<Box<dyn SwapTransaction>>;

    /// Get backend name
    fn name(&self) -> &str;
}

#[async_trait]
pub trait SwapTransaction: Send {
    /// Stage a swap. Nothing is visible outside the transaction until commit.
    async fn swap(&mut self, leg: &SwapLeg) -> Result<SwapFill>;

    /// Apply every staged swap. On error nothing was applied.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged swap
    async fn rollback(self: Box<Self>);
}
