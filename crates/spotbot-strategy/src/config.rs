//! Strategy configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Thresholds and windows for the RSI/MA strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Candle interval requested from the exchange.
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,
    /// Number of candles per evaluation.
    #[serde(default = "default_kline_limit")]
    pub kline_limit: u16,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: Decimal,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: Decimal,
    #[serde(default = "default_ma_period")]
    pub ma_period: usize,
    /// Loss from entry, in percent, that forces an exit.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Gain from entry, in percent, that forces an exit.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Entries allowed per UTC day.
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
}

fn default_kline_interval() -> String {
    "1h".to_string()
}

fn default_kline_limit() -> u16 {
    100
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_overbought() -> Decimal {
    Decimal::from(70)
}

fn default_rsi_oversold() -> Decimal {
    Decimal::from(30)
}

fn default_ma_period() -> usize {
    20
}

fn default_stop_loss_pct() -> Decimal {
    Decimal::new(20, 1) // 2.0%
}

fn default_take_profit_pct() -> Decimal {
    Decimal::new(30, 1) // 3.0%
}

fn default_max_trades_per_day() -> u32 {
    10
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kline_interval: default_kline_interval(),
            kline_limit: default_kline_limit(),
            rsi_period: default_rsi_period(),
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
            ma_period: default_ma_period(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_trades_per_day: default_max_trades_per_day(),
        }
    }
}

impl StrategyConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.rsi_period == 0 || self.ma_period == 0 {
            return Err(format!(
                "rsi_period ({}) and ma_period ({}) must be positive",
                self.rsi_period, self.ma_period
            ));
        }

        let hundred = Decimal::ONE_HUNDRED;
        for (name, value) in [
            ("rsi_oversold", self.rsi_oversold),
            ("rsi_overbought", self.rsi_overbought),
        ] {
            if value.is_sign_negative() || value > hundred {
                return Err(format!("{name} ({value}) must be within [0, 100]"));
            }
        }

        if self.rsi_oversold >= self.rsi_overbought {
            return Err(format!(
                "rsi_oversold ({}) must be less than rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            ));
        }

        if self.stop_loss_pct <= Decimal::ZERO || self.take_profit_pct <= Decimal::ZERO {
            return Err(format!(
                "stop_loss_pct ({}) and take_profit_pct ({}) must be positive",
                self.stop_loss_pct, self.take_profit_pct
            ));
        }

        if usize::from(self.kline_limit) < self.min_closes() {
            return Err(format!(
                "kline_limit ({}) is below the {} closes the indicators need",
                self.kline_limit,
                self.min_closes()
            ));
        }

        if self.kline_interval.trim().is_empty() {
            return Err("kline_interval must not be empty".to_string());
        }

        Ok(())
    }

    /// Closes needed for both indicators to produce a value.
    pub fn min_closes(&self) -> usize {
        (self.rsi_period + 1).max(self.ma_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = StrategyConfig::default();
        assert_eq!(config.rsi_period, 14);
        assert_eq!(config.ma_period, 20);
        assert_eq!(config.rsi_overbought, dec!(70));
        assert_eq!(config.rsi_oversold, dec!(30));
        assert_eq!(config.stop_loss_pct, dec!(2.0));
        assert_eq!(config.take_profit_pct, dec!(3.0));
        assert_eq!(config.max_trades_per_day, 10);
        assert_eq!(config.kline_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_closes() {
        let config = StrategyConfig::default();
        assert_eq!(config.min_closes(), 20);

        let config = StrategyConfig {
            rsi_period: 30,
            ..Default::default()
        };
        assert_eq!(config.min_closes(), 31);
    }

    #[test]
    fn test_validate_inverted_thresholds() {
        let config = StrategyConfig {
            rsi_oversold: dec!(70),
            rsi_overbought: dec!(30),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_period() {
        let config = StrategyConfig {
            rsi_period: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_kline_limit_too_small() {
        let config = StrategyConfig {
            kline_limit: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
