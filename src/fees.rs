//! Fee/tax calculator for simulated trades
//!
//! Taiwan-style cost model: brokerage fee per side with a minimum fee floor,
//! securities transaction tax on sells. Every monetary result is rounded to
//! 2 decimals at the point of computation so rounding never compounds across
//! ledger entries.
//!
//! Compatibility note: the minimum-fee branches reproduce the exact formulas
//! historical ledgers were written with. The minimum-fee sell branch charges
//! tax on the per-share price rather than on notional; ledgers produced under
//! that rule must keep folding to the same totals.

/// Round to 2 decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Brokerage fee before the minimum-fee floor
pub fn raw_fee(shares: i64, price: f64, fee_rate: f64) -> f64 {
    round2(shares as f64 * price * fee_rate)
}

/// Total cash outlay for a buy, fees and tax included
pub fn compute_buy_amount(shares: i64, price: f64, fee_rate: f64, tax_rate: f64, minimum_fee: f64) -> f64 {
    let notional = shares as f64 * price;
    if raw_fee(shares, price, fee_rate) < minimum_fee {
        round2(notional * (1.0 + tax_rate) + minimum_fee)
    } else {
        round2(notional * (1.0 + fee_rate + tax_rate))
    }
}

/// Net cash proceeds for a sell, fees and tax deducted
pub fn compute_sell_amount(shares: i64, price: f64, fee_rate: f64, tax_rate: f64, minimum_fee: f64) -> f64 {
    let notional = shares as f64 * price;
    if raw_fee(shares, price, fee_rate) < minimum_fee {
        // Historical minimum-fee formula: tax on per-share price, kept as-is.
        round2(notional - (price * tax_rate + minimum_fee))
    } else {
        round2(notional * (1.0 - fee_rate - tax_rate))
    }
}

/// Realized P/L for a sell against the position's average cost
pub fn realized_profit_loss(sell_amount: f64, average_cost: f64, shares: i64) -> f64 {
    round2(sell_amount - average_cost * shares as f64)
}

/// Unrealized P/L estimate for a summary row: what liquidating at the current
/// value would realize after exit fees and tax
pub fn unrealized_profit_loss(
    current_value: f64,
    total_cost: f64,
    fee_rate: f64,
    tax_rate: f64,
    minimum_fee: f64,
) -> f64 {
    if round2(current_value * fee_rate) < minimum_fee {
        round2(current_value - (total_cost + current_value * tax_rate + minimum_fee))
    } else {
        round2(current_value - (total_cost + current_value * (fee_rate + tax_rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: f64 = 0.001425;
    const TAX: f64 = 0.003;
    const MIN: f64 = 20.0;

    #[test]
    fn test_round2_half_away_from_zero() {
        // 7.125 is exactly representable, so the .5 case is actually hit
        assert_eq!(round2(7.125), 7.13);
        assert_eq!(round2(-7.125), -7.13);
        assert_eq!(round2(2.004), 2.0);
        assert_eq!(round2(2.006), 2.01);
    }

    #[test]
    fn test_buy_minimum_fee_worked_example() {
        // 100 shares at 50.00: fee = 7.13 < 20 so the floor applies
        assert_eq!(raw_fee(100, 50.0, FEE), 7.13);
        let amount = compute_buy_amount(100, 50.0, FEE, TAX, MIN);
        assert_eq!(amount, 5035.0);
    }

    #[test]
    fn test_buy_above_minimum_fee() {
        // 1000 shares at 100.00: fee = 142.50, full-rate formula
        assert_eq!(raw_fee(1000, 100.0, FEE), 142.5);
        let amount = compute_buy_amount(1000, 100.0, FEE, TAX, MIN);
        assert_eq!(amount, round2(100_000.0 * (1.0 + FEE + TAX)));
        assert_eq!(amount, 100_442.5);
    }

    #[test]
    fn test_buy_amount_never_below_notional() {
        for &(shares, price) in &[(1i64, 10.0), (100, 50.0), (1000, 100.0), (37, 123.45)] {
            let amount = compute_buy_amount(shares, price, FEE, TAX, MIN);
            assert!(
                amount >= shares as f64 * price,
                "buy {}x{} cost {} below notional",
                shares,
                price,
                amount
            );
        }
    }

    #[test]
    fn test_sell_minimum_fee_branch_uses_per_share_tax() {
        // 100 shares at 50.00: fee below floor
        let amount = compute_sell_amount(100, 50.0, FEE, TAX, MIN);
        assert_eq!(amount, round2(5000.0 - (50.0 * TAX + 20.0)));
        assert_eq!(amount, 4979.85);
    }

    #[test]
    fn test_sell_notional_branch() {
        let amount = compute_sell_amount(1000, 100.0, FEE, TAX, MIN);
        assert_eq!(amount, round2(100_000.0 * (1.0 - FEE - TAX)));
        assert_eq!(amount, 99_557.5);
    }

    #[test]
    fn test_unrealized_pl_applies_exit_costs() {
        // Small position: minimum fee branch
        let pl = unrealized_profit_loss(5500.0, 5035.0, FEE, TAX, MIN);
        assert_eq!(pl, round2(5500.0 - (5035.0 + 5500.0 * TAX + 20.0)));

        // Large position: full-rate branch
        let pl = unrealized_profit_loss(110_000.0, 100_000.0, FEE, TAX, MIN);
        assert_eq!(pl, round2(110_000.0 - (100_000.0 + 110_000.0 * (FEE + TAX))));
    }

    #[test]
    fn test_realized_profit_loss() {
        let sell_amount = compute_sell_amount(1000, 100.0, FEE, TAX, MIN);
        let pl = realized_profit_loss(sell_amount, 90.0, 1000);
        assert_eq!(pl, round2(sell_amount - 90_000.0));
        assert!(pl > 0.0);

        let losing = realized_profit_loss(sell_amount, 110.0, 1000);
        assert!(losing < 0.0);
    }
}
