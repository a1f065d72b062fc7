//! Signal engine.
//!
//! `evaluate` is a pure function of a close window and the position
//! snapshot. `generate_signal` fetches candles first and degrades every
//! failure to HOLD so one bad read never stops the control loop.

use crate::config::StrategyConfig;
use crate::error::{StrategyError, StrategyResult};
use crate::indicators::{calculate_rsi, calculate_sma};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use spotbot_core::{Price, Signal};
use spotbot_exchange::{ExchangeClient, Kline};
use spotbot_telemetry::Metrics;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Position state the decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionContext {
    pub in_position: bool,
    pub entry_price: Option<Price>,
    pub trades_today: u32,
}

/// Why a signal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    InsufficientData,
    DataUnavailable,
    StopLoss,
    TakeProfit,
    Oversold,
    Overbought,
    NoSetup,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InsufficientData => "insufficient_data",
            Self::DataUnavailable => "data_unavailable",
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::Oversold => "oversold",
            Self::Overbought => "overbought",
            Self::NoSetup => "no_setup",
        };
        f.write_str(s)
    }
}

/// Result of one evaluation, with the inputs that drove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub signal: Signal,
    pub reason: Reason,
    pub price: Option<Price>,
    pub rsi: Option<Decimal>,
    pub ma: Option<Price>,
}

impl Evaluation {
    fn hold(reason: Reason) -> Self {
        Self {
            signal: Signal::Hold,
            reason,
            price: None,
            rsi: None,
            ma: None,
        }
    }
}

/// RSI/MA signal engine for one symbol.
pub struct SignalEngine {
    symbol: String,
    config: StrategyConfig,
    client: Arc<dyn ExchangeClient>,
    last_signal: Mutex<Option<Signal>>,
}

impl SignalEngine {
    pub fn new(
        symbol: impl Into<String>,
        config: StrategyConfig,
        client: Arc<dyn ExchangeClient>,
    ) -> StrategyResult<Self> {
        config.validate().map_err(StrategyError::Config)?;
        Ok(Self {
            symbol: symbol.into(),
            config,
            client,
            last_signal: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Most recent signal from `generate_signal`.
    pub fn last_signal(&self) -> Option<Signal> {
        *self.last_signal.lock()
    }

    /// Decide on a close window (oldest first, latest close = current price).
    pub fn evaluate(&self, closes: &[Price], ctx: &PositionContext) -> Evaluation {
        let Some(rsi) = calculate_rsi(closes, self.config.rsi_period) else {
            return Evaluation::hold(Reason::InsufficientData);
        };
        let Some(ma) = calculate_sma(closes, self.config.ma_period) else {
            return Evaluation::hold(Reason::InsufficientData);
        };
        let Some(&price) = closes.last() else {
            return Evaluation::hold(Reason::InsufficientData);
        };

        let decide = |signal, reason| Evaluation {
            signal,
            reason,
            price: Some(price),
            rsi: Some(rsi),
            ma: Some(ma),
        };

        if ctx.in_position {
            if let Some(change_pct) = ctx.entry_price.and_then(|entry| price.pct_from(entry)) {
                if -change_pct >= self.config.stop_loss_pct {
                    return decide(Signal::Sell, Reason::StopLoss);
                }
                if change_pct >= self.config.take_profit_pct {
                    return decide(Signal::Sell, Reason::TakeProfit);
                }
            }
        }

        if rsi <= self.config.rsi_oversold
            && price > ma
            && !ctx.in_position
            && ctx.trades_today < self.config.max_trades_per_day
        {
            return decide(Signal::Buy, Reason::Oversold);
        }

        if rsi >= self.config.rsi_overbought && price < ma && ctx.in_position {
            return decide(Signal::Sell, Reason::Overbought);
        }

        decide(Signal::Hold, Reason::NoSetup)
    }

    /// Fetch the configured candle window and return its closes.
    pub async fn fetch_closes(&self) -> StrategyResult<Vec<Price>> {
        let klines = self
            .client
            .get_klines(
                &self.symbol,
                &self.config.kline_interval,
                self.config.kline_limit,
            )
            .await?;
        Ok(Kline::to_price_series(&klines).closes())
    }

    /// Fetch market data and evaluate. Never fails: errors become HOLD.
    pub async fn evaluate_latest(&self, ctx: &PositionContext) -> Evaluation {
        match self.fetch_closes().await {
            Ok(closes) => self.evaluate(&closes, ctx),
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "Market data unavailable, holding");
                Evaluation::hold(Reason::DataUnavailable)
            }
        }
    }

    /// Produce this cycle's signal.
    pub async fn generate_signal(&self, ctx: &PositionContext) -> Signal {
        let evaluation = self.evaluate_latest(ctx).await;

        match evaluation.signal {
            Signal::Hold => debug!(
                symbol = %self.symbol,
                reason = %evaluation.reason,
                rsi = ?evaluation.rsi,
                ma = ?evaluation.ma,
                price = ?evaluation.price,
                "HOLD"
            ),
            signal => info!(
                symbol = %self.symbol,
                %signal,
                reason = %evaluation.reason,
                rsi = ?evaluation.rsi,
                ma = ?evaluation.ma,
                price = ?evaluation.price,
                "Signal generated"
            ),
        }

        Metrics::signal_generated(evaluation.signal.as_str());
        *self.last_signal.lock() = Some(evaluation.signal);
        evaluation.signal
    }
}
