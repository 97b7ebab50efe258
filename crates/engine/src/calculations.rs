//! Pure functions over a snapshot of the position.
//!
//! Derives aggregate metrics from the collateral and borrowed collections:
//! - total collateral value / amount (included assets only)
//! - total borrow value, equity, breakeven price
//! - utilization rate, remaining borrow power, max borrowable amount
//!
//! Every function is total. Degenerate inputs (empty collections, zero
//! multiplier, zero price) yield `0.0` or `f64::INFINITY` as documented on
//! each function, never a panic or a NaN.

use serde::{Deserialize, Serialize};

use lendcalc_common::types::{BorrowedAsset, CollateralAsset};

use crate::risk::RiskBand;

/// Tolerance used when comparing derived USD values.
pub const EPSILON: f64 = 1e-9;

/// Sum of `amount * price` over included collateral.
pub fn total_collateral_value(collaterals: &[CollateralAsset]) -> f64 {
    collaterals
        .iter()
        .filter(|c| c.included)
        .map(|c| c.value())
        .sum()
}

/// Sum of raw token amounts over included collateral.
///
/// Amounts of different tokens are added as-is, so the result is only
/// meaningful for a single collateral asset type. It feeds the breakeven price.
pub fn total_collateral_amount(collaterals: &[CollateralAsset]) -> f64 {
    collaterals
        .iter()
        .filter(|c| c.included)
        .map(|c| c.amount)
        .sum()
}

/// Sum of `amount * price` over all borrowed assets.
pub fn total_borrow_value(borrowed: &[BorrowedAsset]) -> f64 {
    borrowed.iter().map(|a| a.value()).sum()
}

/// Collateral value minus borrowed value. Negative when underwater.
pub fn equity(total_collateral_value: f64, total_borrow: f64) -> f64 {
    total_collateral_value - total_borrow
}

/// Maximum USD value that may be borrowed against the collateral.
pub fn borrow_capacity(total_collateral_value: f64, multiplier: f64) -> f64 {
    total_collateral_value * multiplier
}

/// Collateral price at which equity reaches zero (single collateral asset assumption).
///
/// Returns `0.0` when there is no collateral amount or the multiplier is zero.
pub fn breakeven_price(total_borrow: f64, total_collateral_amount: f64, multiplier: f64) -> f64 {
    if total_collateral_amount > 0.0 && multiplier > 0.0 {
        total_borrow / (multiplier * total_collateral_amount)
    } else {
        0.0
    }
}

/// Borrowed value as a percentage of the borrowing capacity.
///
/// With zero capacity the rate is `f64::INFINITY` if anything is borrowed and
/// `0.0` otherwise.
pub fn utilization_rate(total_borrow: f64, total_collateral_value: f64, multiplier: f64) -> f64 {
    let capacity = borrow_capacity(total_collateral_value, multiplier);
    if capacity > 0.0 {
        (total_borrow / capacity) * 100.0
    } else if total_borrow > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Unused borrowing capacity in USD. Never negative.
pub fn remaining_borrow_power(
    total_collateral_value: f64,
    total_borrowed_value: f64,
    multiplier: f64,
) -> f64 {
    (borrow_capacity(total_collateral_value, multiplier) - total_borrowed_value).max(0.0)
}

/// Largest amount of an asset priced at `price` that fits in the capacity left
/// after `other_assets_value` is borrowed.
///
/// A zero price cannot bound the amount: the result is `f64::INFINITY` when
/// headroom remains and `0.0` otherwise. Callers that enforce the ceiling
/// must special-case zero prices instead of permitting unbounded borrowing.
pub fn max_borrow_amount(
    total_collateral_value: f64,
    multiplier: f64,
    other_assets_value: f64,
    price: f64,
) -> f64 {
    let headroom = borrow_capacity(total_collateral_value, multiplier) - other_assets_value;
    if price > 0.0 {
        (headroom / price).max(0.0)
    } else if headroom > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Utilization of the borrowing capacity, distinguishing an undefined
/// collateral base from an ordinary percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Utilization {
    /// Finite percentage of the capacity in use.
    Ratio { percent: f64 },
    /// Something is borrowed against zero capacity.
    Unbounded,
}

impl Utilization {
    pub fn from_rate(rate: f64) -> Self {
        if rate.is_infinite() {
            Utilization::Unbounded
        } else {
            Utilization::Ratio { percent: rate }
        }
    }

    /// Raw rate, `f64::INFINITY` for the unbounded state.
    pub fn rate(&self) -> f64 {
        match self {
            Utilization::Ratio { percent } => *percent,
            Utilization::Unbounded => f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Utilization::Unbounded)
    }
}

/// All derived metrics of a position at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub total_collateral_value: f64,
    pub total_collateral_amount: f64,
    pub total_borrow_value: f64,
    pub equity: f64,
    pub breakeven_price: f64,
    pub utilization: Utilization,
    pub remaining_borrow_power: f64,
    pub borrow_capacity: f64,
    pub risk: RiskBand,
    pub underwater: bool,
}

impl PositionSummary {
    pub fn compute(
        collaterals: &[CollateralAsset],
        borrowed: &[BorrowedAsset],
        multiplier: f64,
    ) -> Self {
        let collateral_value = total_collateral_value(collaterals);
        let collateral_amount = total_collateral_amount(collaterals);
        let borrow_value = total_borrow_value(borrowed);
        let equity = equity(collateral_value, borrow_value);
        let utilization =
            Utilization::from_rate(utilization_rate(borrow_value, collateral_value, multiplier));

        Self {
            total_collateral_value: collateral_value,
            total_collateral_amount: collateral_amount,
            total_borrow_value: borrow_value,
            equity,
            breakeven_price: breakeven_price(borrow_value, collateral_amount, multiplier),
            utilization,
            remaining_borrow_power: remaining_borrow_power(
                collateral_value,
                borrow_value,
                multiplier,
            ),
            borrow_capacity: borrow_capacity(collateral_value, multiplier),
            risk: RiskBand::from_utilization(utilization),
            underwater: equity < 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendcalc_common::types::AssetId;

    fn collateral(name: &str, price: f64, amount: f64, included: bool) -> CollateralAsset {
        CollateralAsset {
            id: AssetId::generate(),
            name: name.to_string(),
            price,
            amount,
            included,
        }
    }

    fn borrowed(name: &str, price: f64, amount: f64) -> BorrowedAsset {
        BorrowedAsset {
            id: AssetId::generate(),
            name: name.to_string(),
            price,
            amount,
        }
    }

    #[test]
    fn test_total_collateral_value_skips_excluded() {
        let items = vec![
            collateral("ETH", 2000.0, 1.0, true),
            collateral("BTC", 60000.0, 0.5, false),
            collateral("SOL", 150.0, 10.0, true),
        ];
        assert_eq!(total_collateral_value(&items), 3500.0);
        assert_eq!(total_collateral_amount(&items), 11.0);
    }

    #[test]
    fn test_empty_collections_are_zero() {
        assert_eq!(total_collateral_value(&[]), 0.0);
        assert_eq!(total_collateral_amount(&[]), 0.0);
        assert_eq!(total_borrow_value(&[]), 0.0);
    }

    #[test]
    fn test_total_borrow_value() {
        let items = vec![borrowed("USDC", 1.0, 500.0), borrowed("DAI", 1.0, 250.0)];
        assert_eq!(total_borrow_value(&items), 750.0);
    }

    #[test]
    fn test_equity_may_be_negative() {
        assert_eq!(equity(1000.0, 400.0), 600.0);
        assert_eq!(equity(1000.0, 1200.0), -200.0);
    }

    #[test]
    fn test_breakeven_price() {
        assert_eq!(breakeven_price(1600.0, 1.0, 0.8), 2000.0);
        assert_eq!(breakeven_price(1600.0, 0.0, 0.8), 0.0);
        assert_eq!(breakeven_price(1600.0, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_utilization_rate() {
        assert_eq!(utilization_rate(1600.0, 2000.0, 0.8), 100.0);
        assert_eq!(utilization_rate(800.0, 2000.0, 0.8), 50.0);
    }

    #[test]
    fn test_utilization_rate_zero_capacity() {
        assert_eq!(utilization_rate(5.0, 0.0, 0.8), f64::INFINITY);
        assert_eq!(utilization_rate(5.0, 2000.0, 0.0), f64::INFINITY);
        assert_eq!(utilization_rate(0.0, 0.0, 0.8), 0.0);
    }

    #[test]
    fn test_remaining_borrow_power_never_negative() {
        assert_eq!(remaining_borrow_power(2000.0, 0.0, 0.8), 1600.0);
        assert_eq!(remaining_borrow_power(2000.0, 1000.0, 0.8), 600.0);
        assert_eq!(remaining_borrow_power(2000.0, 5000.0, 0.8), 0.0);
    }

    #[test]
    fn test_max_borrow_amount() {
        assert_eq!(max_borrow_amount(2000.0, 0.8, 0.0, 1.0), 1600.0);
        assert_eq!(max_borrow_amount(2000.0, 0.8, 600.0, 2.0), 500.0);
        assert_eq!(max_borrow_amount(2000.0, 0.8, 2000.0, 1.0), 0.0);
    }

    #[test]
    fn test_max_borrow_amount_zero_price() {
        assert_eq!(max_borrow_amount(2000.0, 0.8, 0.0, 0.0), f64::INFINITY);
        assert_eq!(max_borrow_amount(2000.0, 0.8, 1600.0, 0.0), 0.0);
        assert_eq!(max_borrow_amount(0.0, 0.8, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_utilization_serializes_without_infinity() {
        let json = serde_json::to_value(Utilization::Unbounded).unwrap();
        assert_eq!(json["state"], "unbounded");
        let json = serde_json::to_value(Utilization::Ratio { percent: 42.0 }).unwrap();
        assert_eq!(json["state"], "ratio");
        assert_eq!(json["percent"], 42.0);
    }

    #[test]
    fn test_summary() {
        let collaterals = vec![collateral("ETH", 2000.0, 1.0, true)];
        let borrowed = vec![borrowed("USDC", 1.0, 2000.0)];
        let summary = PositionSummary::compute(&collaterals, &borrowed, 0.8);

        assert_eq!(summary.total_collateral_value, 2000.0);
        assert_eq!(summary.total_borrow_value, 2000.0);
        assert_eq!(summary.equity, 0.0);
        assert_eq!(summary.borrow_capacity, 1600.0);
        assert_eq!(summary.remaining_borrow_power, 0.0);
        assert_eq!(summary.utilization, Utilization::Ratio { percent: 125.0 });
        assert_eq!(summary.risk, RiskBand::AtLimit);
        assert!(!summary.underwater);
    }
}
