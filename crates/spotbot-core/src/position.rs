//! Position and daily trade counting.

use crate::Price;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Single-symbol spot position. At most one is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub in_position: bool,
    pub entry_price: Option<Price>,
}

impl Position {
    /// Open at `entry_price`. Returns false if a position was already open.
    pub fn open(&mut self, entry_price: Price) -> bool {
        let was_flat = !self.in_position;
        self.in_position = true;
        self.entry_price = Some(entry_price);
        was_flat
    }

    pub fn close(&mut self) {
        self.in_position = false;
        self.entry_price = None;
    }
}

/// Number of entries taken on the current trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TradeCounter {
    pub trades_today: u32,
    pub last_trade_date: Option<NaiveDate>,
}

impl TradeCounter {
    /// Reset the count when `today` is later than the last recorded date.
    ///
    /// Returns true when a reset happened.
    pub fn roll(&mut self, today: NaiveDate) -> bool {
        match self.last_trade_date {
            Some(last) if today <= last => false,
            _ => {
                let reset = self.trades_today != 0;
                self.trades_today = 0;
                self.last_trade_date = Some(today);
                reset
            }
        }
    }

    /// Count one entry on `today`.
    pub fn record_trade(&mut self, today: NaiveDate) {
        self.roll(today);
        self.trades_today += 1;
        self.last_trade_date = Some(today);
    }
}
