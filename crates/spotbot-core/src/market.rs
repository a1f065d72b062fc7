//! Symbol trading rules.
//!
//! Exchange-imposed granularity for one symbol, loaded once at startup
//! from the `LOT_SIZE` and `PRICE_FILTER` filters and immutable afterwards.

use crate::error::{CoreError, Result};
use crate::{Price, Size};
use serde::{Deserialize, Serialize};

/// Quantity and price filters for a single symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTradingRules {
    pub symbol: String,
    pub min_qty: Size,
    pub max_qty: Size,
    pub step_size: Size,
    pub tick_size: Price,
}

impl SymbolTradingRules {
    /// Build rules, rejecting non-positive increments and an inverted range.
    pub fn new(
        symbol: impl Into<String>,
        min_qty: Size,
        max_qty: Size,
        step_size: Size,
        tick_size: Price,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if !step_size.is_positive() {
            return Err(CoreError::InvalidRules(format!(
                "{symbol}: step size must be positive, got {step_size}"
            )));
        }
        if !tick_size.is_positive() {
            return Err(CoreError::InvalidRules(format!(
                "{symbol}: tick size must be positive, got {tick_size}"
            )));
        }
        if max_qty.is_positive() && min_qty > max_qty {
            return Err(CoreError::InvalidRules(format!(
                "{symbol}: min qty {min_qty} exceeds max qty {max_qty}"
            )));
        }

        Ok(Self {
            symbol,
            min_qty,
            max_qty,
            step_size,
            tick_size,
        })
    }

    /// Truncate a raw quantity to the lot step.
    #[must_use]
    pub fn normalize_quantity(&self, quantity: Size) -> Size {
        quantity.round_to_step(self.step_size)
    }

    /// Truncate a raw price to the tick.
    #[must_use]
    pub fn normalize_price(&self, price: Price) -> Price {
        price.round_to_tick(self.tick_size)
    }

    /// A zero `max_qty` means the exchange publishes no upper bound.
    pub fn exceeds_max(&self, quantity: Size) -> bool {
        self.max_qty.is_positive() && quantity > self.max_qty
    }
}
