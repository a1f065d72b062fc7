//! Technical indicators over closing prices.

use rust_decimal::Decimal;
use spotbot_core::Price;

/// Relative Strength Index.
///
/// Successive differences are taken over the whole window, but gains and
/// losses are averaged over the FIRST `period` differences only (the
/// oldest part of the window), not a trailing or smoothed average.
///
/// Returns `None` when `period` is zero or the window holds fewer than
/// `period + 1` closes. Returns exactly 100 when the averaged differences
/// contain no loss.
pub fn calculate_rsi(closes: &[Price], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let (gain_sum, loss_sum) = closes
        .windows(2)
        .take(period)
        .map(|w| w[1].inner() - w[0].inner())
        .fold((Decimal::ZERO, Decimal::ZERO), |(gains, losses), change| {
            if change > Decimal::ZERO {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let n = Decimal::from(period as u64);
    let avg_gain = gain_sum / n;
    let avg_loss = loss_sum / n;

    if avg_loss.is_zero() {
        return Some(Decimal::ONE_HUNDRED);
    }

    let rs = avg_gain / avg_loss;
    Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
}

/// Simple moving average of the last `period` closes.
pub fn calculate_sma(closes: &[Price], period: usize) -> Option<Price> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let sum: Decimal = closes[closes.len() - period..]
        .iter()
        .map(Price::inner)
        .sum();
    Some(Price::new(sum / Decimal::from(period as u64)))
}
