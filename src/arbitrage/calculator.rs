//! Profit Calculator
//!
//! Pure integer arithmetic for fee-adjusted arbitrage profit, price spreads
//! and gas estimates. Every division is a floor (truncating) division; no
//! value is ever rounded up. Intermediate overflow is reported as
//! `ArbError::InvalidAmount` instead of wrapping.

use crate::error::{ArbError, Result};
use crate::types::{Price, BPS_DENOMINATOR, PRICE_SCALE};

/// Fixed gas overhead of an arbitrage transaction
pub const BASE_GAS: u64 = 100_000;
/// Gas per swap leg
pub const SWAP_GAS: u64 = 150_000;
/// Gas for the borrow + repay pair
pub const LOAN_GAS: u64 = 200_000;
/// Extra gas charged per `LOAN_GAS_UNIT` of principal
pub const GAS_PER_LOAN_UNIT: u64 = 1_000;
pub const LOAN_GAS_UNIT: u128 = 1_000_000_000;

/// Swaps in a two-exchange round trip
pub const ROUND_TRIP_SWAPS: u64 = 2;

/// Spread buffer required on top of the flash loan fee (1%)
pub const SPREAD_BUFFER_BPS: u128 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitBreakdown {
    pub gross_profit: u128,
    pub net_profit: u128,
    pub loan_fee_amount: u128,
    pub profitable: bool,
}

pub struct ProfitCalculator;

impl ProfitCalculator {
    /// floor(amount * bps / 10000)
    pub fn bps_of(amount: u128, bps: u32) -> Result<u128> {
        amount
            .checked_mul(bps as u128)
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or_else(|| ArbError::overflow("basis-point share"))
    }

    /// Amount left after a fee is taken: amount - floor(amount * bps / 10000)
    pub fn after_fee(amount: u128, fee_bps: u32) -> Result<u128> {
        let fee = Self::bps_of(amount, fee_bps)?;
        // fee <= amount whenever fee_bps <= 10000
        amount
            .checked_sub(fee)
            .ok_or_else(|| ArbError::InvalidAmount(format!("fee {} bps exceeds 100%", fee_bps)))
    }

    /// Fee-only profit model for a round trip of `amount` through two exchanges
    pub fn compute_profit(
        amount: u128,
        buy_fee_bps: u32,
        sell_fee_bps: u32,
        loan_fee_bps: u32,
        min_profit_threshold: u128,
    ) -> Result<ProfitBreakdown> {
        let buy_amount_after_fee = Self::after_fee(amount, buy_fee_bps)?;
        let sell_amount_after_fee = Self::after_fee(buy_amount_after_fee, sell_fee_bps)?;
        Self::settle(amount, sell_amount_after_fee, loan_fee_bps, min_profit_threshold)
    }

    /// Profit of a round trip that turned `amount` into `proceeds`, net of the loan fee
    pub fn settle(
        amount: u128,
        proceeds: u128,
        loan_fee_bps: u32,
        min_profit_threshold: u128,
    ) -> Result<ProfitBreakdown> {
        let loan_fee_amount = Self::bps_of(amount, loan_fee_bps)?;
        let gross_profit = proceeds.saturating_sub(amount);
        let net_profit = gross_profit.saturating_sub(loan_fee_amount);

        Ok(ProfitBreakdown {
            gross_profit,
            net_profit,
            loan_fee_amount,
            profitable: net_profit > min_profit_threshold,
        })
    }

    /// floor(|p1 - p2| * 10000 / min(p1, p2))
    pub fn diff_bps(price1: Price, price2: Price) -> Result<u128> {
        let (low, high) = if price1 <= price2 {
            (price1.raw(), price2.raw())
        } else {
            (price2.raw(), price1.raw())
        };
        // Price::new guarantees low > 0
        (high - low)
            .checked_mul(BPS_DENOMINATOR)
            .map(|v| v / low)
            .ok_or_else(|| ArbError::overflow("price difference"))
    }

    /// Spread must beat the loan fee plus a fixed 1% buffer
    pub fn spread_clears_fee(diff_bps: u128, flash_loan_fee_bps: u32) -> bool {
        diff_bps > flash_loan_fee_bps as u128 + SPREAD_BUFFER_BPS
    }

    /// floor(amount * diff_bps / 10000)
    pub fn estimated_gross(amount: u128, diff_bps: u128) -> Result<u128> {
        amount
            .checked_mul(diff_bps)
            .map(|v| v / BPS_DENOMINATOR)
            .ok_or_else(|| ArbError::overflow("estimated profit"))
    }

    /// base + swaps * per-swap + loan + floor(loan / 1e9) * 1000, saturating
    pub fn estimate_gas(loan_amount: u128, num_swaps: u64) -> u64 {
        let units = u64::try_from(loan_amount / LOAN_GAS_UNIT).unwrap_or(u64::MAX);
        BASE_GAS
            .saturating_add(num_swaps.saturating_mul(SWAP_GAS))
            .saturating_add(LOAN_GAS)
            .saturating_add(units.saturating_mul(GAS_PER_LOAN_UNIT))
    }

    /// Token A received for `amount_b` of token B at `price` (B per A), fee taken on input
    pub fn quote_buy(amount_b: u128, price: Price, fee_bps: u32) -> Result<u128> {
        Self::after_fee(amount_b, fee_bps)?
            .checked_mul(PRICE_SCALE)
            .map(|v| v / price.raw())
            .ok_or_else(|| ArbError::overflow("buy quote"))
    }

    /// Token B received for `amount_a` of token A at `price` (B per A), fee taken on input
    pub fn quote_sell(amount_a: u128, price: Price, fee_bps: u32) -> Result<u128> {
        Self::after_fee(amount_a, fee_bps)?
            .checked_mul(price.raw())
            .map(|v| v / PRICE_SCALE)
            .ok_or_else(|| ArbError::overflow("sell quote"))
    }

    /// Minimum acceptable output given a slippage tolerance:
    /// floor(expected * (10000 - slippage_bps) / 10000)
    pub fn min_out(expected: u128, slippage_bps: u32) -> Result<u128> {
        Self::after_fee(expected, slippage_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(raw: u128) -> Price {
        Price::new(raw).unwrap()
    }

    #[test]
    fn test_compute_profit_fee_only_round_trip() {
        // 1000 units, 0.30% buy, 0.25% sell, 0.30% loan fee
        let result = ProfitCalculator::compute_profit(1_000_000_000, 30, 25, 30, 1_000_000).unwrap();

        // floor(1_000_000_000 * 30 / 10000)
        assert_eq!(result.loan_fee_amount, 3_000_000);
        // Fees only ever shrink the amount, so a pure fee round trip never profits
        assert_eq!(result.gross_profit, 0);
        assert_eq!(result.net_profit, 0);
        assert!(!result.profitable);
    }

    #[test]
    fn test_loan_fee_three_bps() {
        let result = ProfitCalculator::compute_profit(1_000_000_000, 0, 0, 3, 0).unwrap();
        assert_eq!(result.loan_fee_amount, 300_000);
    }

    #[test]
    fn test_total_repayment() {
        let fee = ProfitCalculator::bps_of(1_000_000_000, 30).unwrap();
        assert_eq!(1_000_000_000 + fee, 1_003_000_000);
    }

    #[test]
    fn test_floor_division_never_rounds_up() {
        // 999 * 30 / 10000 = 2.997 -> 2
        assert_eq!(ProfitCalculator::bps_of(999, 30).unwrap(), 2);
        // 333 * 1 / 10000 = 0.0333 -> 0
        assert_eq!(ProfitCalculator::bps_of(333, 1).unwrap(), 0);
        assert_eq!(ProfitCalculator::after_fee(999, 30).unwrap(), 997);
    }

    #[test]
    fn test_settle_from_realized_proceeds() {
        // Turned 1_000_000_000 into 1_050_000_000, loan fee 30 bps = 3_000_000
        let result = ProfitCalculator::settle(1_000_000_000, 1_050_000_000, 30, 1_000_000).unwrap();
        assert_eq!(result.gross_profit, 50_000_000);
        assert_eq!(result.net_profit, 47_000_000);
        assert!(result.profitable);
    }

    #[test]
    fn test_settle_threshold_is_strict() {
        // Net profit exactly equal to threshold is not profitable
        let result = ProfitCalculator::settle(1_000, 1_110, 1_000, 10).unwrap();
        assert_eq!(result.loan_fee_amount, 100);
        assert_eq!(result.net_profit, 10);
        assert!(!result.profitable);
    }

    #[test]
    fn test_settle_loss_clamps_to_zero() {
        let result = ProfitCalculator::settle(1_000, 900, 30, 0).unwrap();
        assert_eq!(result.gross_profit, 0);
        assert_eq!(result.net_profit, 0);
        assert!(!result.profitable);
    }

    #[test]
    fn test_overflow_is_invalid_amount() {
        let err = ProfitCalculator::compute_profit(u128::MAX, 30, 25, 30, 0).unwrap_err();
        assert_eq!(err.code(), "ERR-INVALID-AMOUNT");
        assert!(ProfitCalculator::estimated_gross(u128::MAX, 666).is_err());
    }

    #[test]
    fn test_diff_bps() {
        let diff = ProfitCalculator::diff_bps(price(1_500_000), price(1_600_000)).unwrap();
        assert_eq!(diff, 666);
        // Symmetric in argument order
        let diff = ProfitCalculator::diff_bps(price(1_600_000), price(1_500_000)).unwrap();
        assert_eq!(diff, 666);
        assert_eq!(ProfitCalculator::diff_bps(price(7), price(7)).unwrap(), 0);
    }

    #[test]
    fn test_spread_clears_fee_plus_buffer() {
        assert!(ProfitCalculator::spread_clears_fee(666, 30));
        assert!(!ProfitCalculator::spread_clears_fee(130, 30));
        assert!(ProfitCalculator::spread_clears_fee(131, 30));
    }

    #[test]
    fn test_estimated_gross() {
        assert_eq!(ProfitCalculator::estimated_gross(1_000_000_000, 666).unwrap(), 66_600_000);
    }

    #[test]
    fn test_estimate_gas() {
        assert_eq!(ProfitCalculator::estimate_gas(1_000_000_000, 2), 601_000);
        assert!(ProfitCalculator::estimate_gas(1_000_000_000, 2) <= 2_000_000);

        // 10 swaps on a very large loan blows the default gas limit
        let high = ProfitCalculator::estimate_gas(10_000_000_000_000, 10);
        assert_eq!(high, 11_800_000);
        assert!(high > 2_000_000);

        assert_eq!(ProfitCalculator::estimate_gas(u128::MAX, 2), u64::MAX);
    }

    #[test]
    fn test_round_trip_quotes() {
        // 1000 B at 1.5 B/A with 0.30% fee -> 997 B in -> 664.666666 A
        let bought = ProfitCalculator::quote_buy(1_000_000_000, price(1_500_000), 30).unwrap();
        assert_eq!(bought, 664_666_666);

        // Sell at 1.6 B/A with 0.25% fee
        let sold = ProfitCalculator::quote_sell(bought, price(1_600_000), 25).unwrap();
        assert_eq!(sold, 1_060_808_000);

        let result = ProfitCalculator::settle(1_000_000_000, sold, 30, 1_000_000).unwrap();
        assert_eq!(result.gross_profit, 60_808_000);
        assert_eq!(result.net_profit, 57_808_000);
        assert!(result.profitable);
    }

    #[test]
    fn test_min_out() {
        // 3% slippage on 1_000_000
        assert_eq!(ProfitCalculator::min_out(1_000_000, 300).unwrap(), 970_000);
        assert_eq!(ProfitCalculator::min_out(1_000_000, 0).unwrap(), 1_000_000);
    }
}
