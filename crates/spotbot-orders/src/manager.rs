//! Order lifecycle manager.
//!
//! # Shared state
//!
//! The control loop (`execute`, `cancel`), the stream's connection task
//! (`on_execution_report`) and shutdown (`cancel_all`) all touch the same
//! active-order set, position and trade counter. They live together behind
//! one mutex so every mutation sees a consistent triple.
//!
//! The lock is never held across an exchange call: decisions are read,
//! the lock released, the request sent, and the result applied under a
//! fresh lock. A `placing` flag in the book covers that gap for `execute`:
//! while one placement is in flight, a second is refused.

use crate::error::{OrderError, OrderResult};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use spotbot_core::{
    OrderSide, OrderStatus, Position, Price, Signal, Size, SymbolTradingRules, TradeCounter,
};
use spotbot_exchange::{ExchangeClient, OrderAck, OrderRequest};
use spotbot_strategy::PositionContext;
use spotbot_telemetry::Metrics;
use spotbot_ws::{ExecutionReport, UserDataEvent, UserDataHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Order manager settings.
#[derive(Debug, Clone)]
pub struct OrderManagerConfig {
    pub symbol: String,
    /// Base-asset quantity per order, before lot-step normalization.
    pub order_size: Size,
}

/// An order placed by this process and not yet reported terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveOrder {
    pub order_id: u64,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Size,
    /// Market price observed just before placement.
    pub reference_price: Price,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

/// Position snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionInfo {
    pub in_position: bool,
    pub entry_price: Option<Price>,
    pub trades_today: u32,
    pub last_trade_date: Option<NaiveDate>,
    pub active_orders: usize,
}

#[derive(Debug, Default)]
struct OrderBook {
    active_orders: HashMap<u64, ActiveOrder>,
    position: Position,
    counter: TradeCounter,
    placing: bool,
}

/// Clears the placement flag when `execute` returns or is dropped.
struct PlacementGuard<'a> {
    state: &'a Mutex<OrderBook>,
}

impl Drop for PlacementGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().placing = false;
    }
}

/// Places market orders for signals and tracks their lifecycle.
pub struct OrderManager {
    config: OrderManagerConfig,
    rules: SymbolTradingRules,
    client: Arc<dyn ExchangeClient>,
    state: Mutex<OrderBook>,
}

impl OrderManager {
    /// Load the symbol's trading rules and build the manager.
    ///
    /// Fails when the exchange info cannot be fetched or lacks the symbol's
    /// lot-size or price filter; the bot cannot size orders without them.
    pub async fn new(
        config: OrderManagerConfig,
        client: Arc<dyn ExchangeClient>,
    ) -> OrderResult<Self> {
        let info = client.get_exchange_info().await?;
        let rules = info.trading_rules(&config.symbol)?;
        info!(
            symbol = %rules.symbol,
            min_qty = %rules.min_qty,
            max_qty = %rules.max_qty,
            step_size = %rules.step_size,
            tick_size = %rules.tick_size,
            "Trading rules loaded"
        );
        Self::with_rules(config, rules, client)
    }

    /// Build from already-known rules.
    pub fn with_rules(
        config: OrderManagerConfig,
        rules: SymbolTradingRules,
        client: Arc<dyn ExchangeClient>,
    ) -> OrderResult<Self> {
        if !config.order_size.is_positive() {
            return Err(OrderError::Config(format!(
                "order_size must be positive, got {}",
                config.order_size
            )));
        }
        if rules.symbol != config.symbol {
            return Err(OrderError::Config(format!(
                "rules are for {}, manager trades {}",
                rules.symbol, config.symbol
            )));
        }

        Ok(Self {
            config,
            rules,
            client,
            state: Mutex::new(OrderBook::default()),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn rules(&self) -> &SymbolTradingRules {
        &self.rules
    }

    /// Act on a signal.
    ///
    /// HOLD is a no-op. BUY and SELL place a market order for the normalized
    /// order size; on success the order is tracked and the position updated.
    /// Every failure is logged and returns `None` with no state change.
    pub async fn execute(&self, signal: Signal) -> Option<OrderAck> {
        self.execute_on(signal, Utc::now().date_naive()).await
    }

    async fn execute_on(&self, signal: Signal, today: NaiveDate) -> Option<OrderAck> {
        let side = signal.order_side()?;
        let symbol = self.config.symbol.as_str();

        {
            let mut book = self.state.lock();
            if book.placing {
                warn!(%symbol, %side, "Another order is in flight, not placing");
                Metrics::order_aborted("order_in_flight");
                return None;
            }
            match side {
                OrderSide::Buy if book.position.in_position => {
                    warn!(%symbol, "BUY while already in position, not adding");
                    Metrics::order_aborted("already_in_position");
                    return None;
                }
                OrderSide::Sell if !book.position.in_position => {
                    warn!(%symbol, "SELL with no open position, nothing to close");
                    Metrics::order_aborted("no_position");
                    return None;
                }
                _ => {}
            }
            book.placing = true;
        }
        let _placement = PlacementGuard { state: &self.state };

        let price = match self.client.get_symbol_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                error!(%symbol, %side, error = %e, "Price unavailable, order aborted");
                Metrics::order_aborted("price_unavailable");
                return None;
            }
        };

        let quantity = self.rules.normalize_quantity(self.config.order_size);
        if quantity < self.rules.min_qty {
            warn!(
                %quantity,
                min_qty = %self.rules.min_qty,
                "Order quantity below minimum, order aborted"
            );
            Metrics::order_aborted("below_min_qty");
            return None;
        }
        if self.rules.exceeds_max(quantity) {
            warn!(
                %quantity,
                max_qty = %self.rules.max_qty,
                "Order quantity above maximum, order aborted"
            );
            Metrics::order_aborted("above_max_qty");
            return None;
        }

        let request = OrderRequest::market(symbol, side, quantity);
        let client_order_id = request.client_order_id.to_string();
        let ack = match self.client.create_order(request).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(%symbol, %side, %quantity, error = %e, "Order placement failed");
                Metrics::order_aborted(e.kind());
                return None;
            }
        };

        let (active, in_position) = {
            let mut book = self.state.lock();
            book.active_orders.insert(
                ack.order_id,
                ActiveOrder {
                    order_id: ack.order_id,
                    client_order_id: ack.client_order_id.clone().or(Some(client_order_id)),
                    symbol: symbol.to_string(),
                    side,
                    quantity,
                    reference_price: price,
                    status: ack.status,
                    placed_at: Utc::now(),
                },
            );
            match side {
                OrderSide::Buy => {
                    if book.position.open(price) {
                        book.counter.record_trade(today);
                    }
                }
                OrderSide::Sell => book.position.close(),
            }
            (book.active_orders.len(), book.position.in_position)
        };

        Metrics::order_placed(side.as_str());
        Metrics::active_orders(active);
        Metrics::in_position(in_position);
        info!(
            order_id = ack.order_id,
            %side,
            %quantity,
            %price,
            status = %ack.status,
            "Order placed"
        );
        Some(ack)
    }

    /// Cancel a tracked order. Returns true once the exchange confirms.
    ///
    /// Unknown ids are a no-op. On failure the order stays tracked.
    pub async fn cancel(&self, order_id: u64) -> bool {
        let symbol = match self.state.lock().active_orders.get(&order_id) {
            Some(order) => order.symbol.clone(),
            None => {
                debug!(order_id, "Cancel requested for untracked order");
                return false;
            }
        };

        match self.client.cancel_order(&symbol, order_id).await {
            Ok(ack) => {
                let remaining = {
                    let mut book = self.state.lock();
                    book.active_orders.remove(&order_id);
                    book.active_orders.len()
                };
                Metrics::order_cancelled();
                Metrics::active_orders(remaining);
                info!(order_id, status = %ack.status, "Order cancelled");
                true
            }
            Err(e) => {
                warn!(order_id, error = %e, "Cancel failed, order still tracked");
                false
            }
        }
    }

    /// Best-effort cancel of every tracked order. Returns how many the
    /// exchange confirmed.
    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<u64> = self.state.lock().active_orders.keys().copied().collect();
        if ids.is_empty() {
            return 0;
        }

        info!(count = ids.len(), "Cancelling active orders");
        let mut cancelled = 0;
        for order_id in ids {
            if self.cancel(order_id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Query a tracked order. `None` for untracked ids or a failed query.
    pub async fn order_status(&self, order_id: u64) -> Option<OrderAck> {
        let symbol = self
            .state
            .lock()
            .active_orders
            .get(&order_id)
            .map(|o| o.symbol.clone())?;

        match self.client.get_order_status(&symbol, order_id).await {
            Ok(ack) => Some(ack),
            Err(e) => {
                warn!(order_id, error = %e, "Order status query failed");
                None
            }
        }
    }

    /// Apply an execution report. Returns true if a tracked order was
    /// retired.
    ///
    /// Untracked ids and non-terminal statuses are ignored, so replaying a
    /// report is harmless.
    pub fn on_execution_report(&self, report: &ExecutionReport) -> bool {
        if !report.status.is_terminal() {
            if let Some(order) = self.state.lock().active_orders.get_mut(&report.order_id) {
                order.status = report.status;
            }
            return false;
        }

        let (removed, remaining) = {
            let mut book = self.state.lock();
            let removed = book.active_orders.remove(&report.order_id);
            (removed, book.active_orders.len())
        };

        match removed {
            Some(order) => {
                Metrics::active_orders(remaining);
                info!(
                    order_id = order.order_id,
                    side = %order.side,
                    status = %report.status,
                    "Order closed"
                );
                true
            }
            None => {
                debug!(order_id = report.order_id, status = %report.status, "Report for untracked order");
                false
            }
        }
    }

    /// Snapshot of tracked orders, oldest first.
    pub fn active_orders(&self) -> Vec<ActiveOrder> {
        let mut orders: Vec<ActiveOrder> =
            self.state.lock().active_orders.values().cloned().collect();
        orders.sort_by_key(|o| (o.placed_at, o.order_id));
        orders
    }

    pub fn active_order_count(&self) -> usize {
        self.state.lock().active_orders.len()
    }

    pub fn position_info(&self) -> PositionInfo {
        let book = self.state.lock();
        PositionInfo {
            in_position: book.position.in_position,
            entry_price: book.position.entry_price,
            trades_today: book.counter.trades_today,
            last_trade_date: book.counter.last_trade_date,
            active_orders: book.active_orders.len(),
        }
    }

    /// Roll the trade counter to `today` and return what the signal engine
    /// needs to decide.
    pub fn signal_context(&self, today: NaiveDate) -> PositionContext {
        let mut book = self.state.lock();
        if book.counter.roll(today) {
            info!(%today, "New trading day, trade count reset");
        }
        PositionContext {
            in_position: book.position.in_position,
            entry_price: book.position.entry_price,
            trades_today: book.counter.trades_today,
        }
    }
}

impl UserDataHandler for OrderManager {
    fn on_event(&self, event: &UserDataEvent) {
        if let UserDataEvent::ExecutionReport(report) = event {
            if report.symbol == self.config.symbol {
                self.on_execution_report(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rust_decimal_macros::dec;
    use spotbot_exchange::{ExchangeError, MockCall, MockExchange};

    const SYMBOL: &str = "BTCUSDT";

    fn mock() -> Arc<MockExchange> {
        let mock = MockExchange::new().with_symbol(
            SYMBOL,
            Size::new(dec!(0.0001)),
            Size::new(dec!(100)),
            Size::new(dec!(0.0001)),
            Price::new(dec!(0.01)),
        );
        mock.set_price(Price::new(dec!(43250.12)));
        Arc::new(mock)
    }

    fn config(order_size: Size) -> OrderManagerConfig {
        OrderManagerConfig {
            symbol: SYMBOL.to_string(),
            order_size,
        }
    }

    async fn manager(mock: &Arc<MockExchange>) -> OrderManager {
        OrderManager::new(config(Size::new(dec!(0.00123456))), mock.clone())
            .await
            .unwrap()
    }

    fn report(order_id: u64, status: OrderStatus) -> ExecutionReport {
        ExecutionReport {
            event_time: 1,
            symbol: SYMBOL.to_string(),
            client_order_id: String::new(),
            side: Some(OrderSide::Buy),
            order_type: Some("MARKET".to_string()),
            execution_type: Some("TRADE".to_string()),
            status,
            order_id,
            cumulative_filled_qty: None,
            last_price: None,
        }
    }

    #[tokio::test]
    async fn test_new_fails_without_symbol() {
        let mock = Arc::new(MockExchange::new().with_symbol(
            "ETHUSDT",
            Size::new(dec!(0.001)),
            Size::new(dec!(100)),
            Size::new(dec!(0.001)),
            Price::new(dec!(0.01)),
        ));
        let result = OrderManager::new(config(Size::new(dec!(0.001))), mock).await;
        assert!(matches!(result, Err(OrderError::Rules(_))));
    }

    #[tokio::test]
    async fn test_hold_is_noop() {
        let mock = mock();
        let manager = manager(&mock).await;
        let calls_before = mock.calls().len();

        assert!(manager.execute(Signal::Hold).await.is_none());
        assert_eq!(mock.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_buy_places_normalized_market_order() {
        let mock = mock();
        let manager = manager(&mock).await;

        let ack = manager.execute(Signal::Buy).await.unwrap();

        let orders = mock.created_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].quantity, Some(Size::new(dec!(0.0012))));

        let info = manager.position_info();
        assert!(info.in_position);
        assert_eq!(info.entry_price, Some(Price::new(dec!(43250.12))));
        assert_eq!(info.trades_today, 1);
        assert_eq!(info.active_orders, 1);

        let active = manager.active_orders();
        assert_eq!(active[0].order_id, ack.order_id);
        assert_eq!(active[0].quantity, Size::new(dec!(0.0012)));
    }

    #[tokio::test]
    async fn test_sell_closes_position() {
        let mock = mock();
        let manager = manager(&mock).await;

        manager.execute(Signal::Buy).await.unwrap();
        manager.execute(Signal::Sell).await.unwrap();

        let info = manager.position_info();
        assert!(!info.in_position);
        assert_eq!(info.entry_price, None);
        assert_eq!(info.trades_today, 1);
        assert_eq!(info.active_orders, 2);
    }

    #[tokio::test]
    async fn test_buy_in_position_and_sell_while_flat_are_rejected() {
        let mock = mock();
        let manager = manager(&mock).await;

        assert!(manager.execute(Signal::Sell).await.is_none());
        assert!(mock.created_orders().is_empty());

        manager.execute(Signal::Buy).await.unwrap();
        assert!(manager.execute(Signal::Buy).await.is_none());
        assert_eq!(mock.created_orders().len(), 1);
        assert_eq!(manager.position_info().trades_today, 1);
    }

    #[tokio::test]
    async fn test_below_min_qty_aborts_without_order() {
        let mock = mock();
        let manager = OrderManager::new(config(Size::new(dec!(0.00005))), mock.clone())
            .await
            .unwrap();

        assert!(manager.execute(Signal::Buy).await.is_none());
        assert!(mock.created_orders().is_empty());
        assert!(!manager.position_info().in_position);
    }

    #[tokio::test]
    async fn test_above_max_qty_aborts_without_order() {
        let mock = mock();
        let manager = OrderManager::new(config(Size::new(dec!(150))), mock.clone())
            .await
            .unwrap();

        assert!(manager.execute(Signal::Buy).await.is_none());
        assert!(mock.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_placement_failure_mutates_nothing() {
        let mock = mock();
        let manager = manager(&mock).await;
        mock.fail_next_order(ExchangeError::from_response(
            400,
            r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#,
        ));

        assert!(manager.execute(Signal::Buy).await.is_none());
        let info = manager.position_info();
        assert!(!info.in_position);
        assert_eq!(info.trades_today, 0);
        assert_eq!(info.active_orders, 0);
    }

    #[tokio::test]
    async fn test_price_failure_aborts() {
        let mock = Arc::new(MockExchange::new().with_symbol(
            SYMBOL,
            Size::new(dec!(0.0001)),
            Size::new(dec!(100)),
            Size::new(dec!(0.0001)),
            Price::new(dec!(0.01)),
        ));
        let manager = manager(&mock).await;

        assert!(manager.execute(Signal::Buy).await.is_none());
        assert!(mock.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_execution_report_is_idempotent() {
        let mock = mock();
        let manager = manager(&mock).await;
        let ack = manager.execute(Signal::Buy).await.unwrap();

        assert!(!manager.on_execution_report(&report(ack.order_id, OrderStatus::PartiallyFilled)));
        assert_eq!(manager.active_order_count(), 1);
        assert_eq!(manager.active_orders()[0].status, OrderStatus::PartiallyFilled);

        assert!(manager.on_execution_report(&report(ack.order_id, OrderStatus::Filled)));
        assert_eq!(manager.active_order_count(), 0);

        assert!(!manager.on_execution_report(&report(ack.order_id, OrderStatus::Filled)));
        assert!(!manager.on_execution_report(&report(999, OrderStatus::Canceled)));
        assert!(manager.position_info().in_position);
    }

    #[tokio::test]
    async fn test_expired_in_match_keeps_order_tracked() {
        let mock = mock();
        let manager = manager(&mock).await;
        let ack = manager.execute(Signal::Buy).await.unwrap();

        assert!(!manager.on_execution_report(&report(ack.order_id, OrderStatus::ExpiredInMatch)));
        assert_eq!(manager.active_order_count(), 1);
        assert_eq!(manager.active_orders()[0].status, OrderStatus::ExpiredInMatch);
    }

    #[tokio::test]
    async fn test_execute_refused_while_placement_in_flight() {
        let mock = mock();
        let manager = manager(&mock).await;

        manager.state.lock().placing = true;
        assert!(manager.execute(Signal::Buy).await.is_none());
        assert!(mock.calls().iter().all(|c| !matches!(c, MockCall::GetSymbolPrice(_))));
        assert!(mock.created_orders().is_empty());

        manager.state.lock().placing = false;
        assert!(manager.execute(Signal::Buy).await.is_some());
        assert!(!manager.state.lock().placing);
    }

    #[tokio::test]
    async fn test_placement_flag_cleared_after_failure() {
        let mock = mock();
        mock.fail_next_order(ExchangeError::from_response(
            400,
            r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#,
        ));
        let manager = manager(&mock).await;

        assert!(manager.execute(Signal::Buy).await.is_none());
        assert!(!manager.state.lock().placing);
        assert!(manager.execute(Signal::Buy).await.is_some());
    }

    #[tokio::test]
    async fn test_stream_events_route_to_manager() {
        let mock = mock();
        let manager = manager(&mock).await;
        let ack = manager.execute(Signal::Buy).await.unwrap();

        let mut other_symbol = report(ack.order_id, OrderStatus::Filled);
        other_symbol.symbol = "ETHUSDT".to_string();
        manager.on_event(&UserDataEvent::ExecutionReport(other_symbol));
        assert_eq!(manager.active_order_count(), 1);

        manager.on_event(&UserDataEvent::ExecutionReport(report(
            ack.order_id,
            OrderStatus::Expired,
        )));
        assert_eq!(manager.active_order_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_success_and_failure() {
        let mock = mock();
        let manager = manager(&mock).await;
        let first = manager.execute(Signal::Buy).await.unwrap();
        let second = manager.execute(Signal::Sell).await.unwrap();
        mock.fail_cancel(second.order_id);

        assert!(manager.cancel(first.order_id).await);
        assert!(!manager.cancel(second.order_id).await);
        assert_eq!(manager.active_order_count(), 1);
        assert_eq!(manager.active_orders()[0].order_id, second.order_id);
    }

    #[tokio::test]
    async fn test_cancel_unknown_is_noop() {
        let mock = mock();
        let manager = manager(&mock).await;

        assert!(!manager.cancel(42).await);
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::CancelOrder { .. })));
    }

    #[tokio::test]
    async fn test_cancel_all_is_best_effort() {
        let mock = mock();
        let manager = manager(&mock).await;
        let first = manager.execute(Signal::Buy).await.unwrap();
        manager.execute(Signal::Sell).await.unwrap();
        mock.fail_cancel(first.order_id);

        assert_eq!(manager.cancel_all().await, 1);
        assert_eq!(manager.active_order_count(), 1);
    }

    #[tokio::test]
    async fn test_order_status_only_for_tracked() {
        let mock = mock();
        let manager = manager(&mock).await;
        assert!(manager.order_status(5).await.is_none());

        let ack = manager.execute(Signal::Buy).await.unwrap();
        let status = manager.order_status(ack.order_id).await.unwrap();
        assert_eq!(status.order_id, ack.order_id);
    }

    #[tokio::test]
    async fn test_signal_context_rolls_day() {
        let mock = mock();
        let manager = manager(&mock).await;
        let today = Utc::now().date_naive();
        manager.execute_on(Signal::Buy, today).await.unwrap();

        let context = manager.signal_context(today);
        assert!(context.in_position);
        assert_eq!(context.trades_today, 1);

        let tomorrow = today.checked_add_days(Days::new(1)).unwrap();
        let context = manager.signal_context(tomorrow);
        assert_eq!(context.trades_today, 0);
        assert!(context.in_position);
        assert_eq!(manager.position_info().last_trade_date, Some(tomorrow));
    }

    #[test]
    fn test_rejects_non_positive_order_size() {
        let rules = SymbolTradingRules::new(
            SYMBOL,
            Size::new(dec!(0.0001)),
            Size::new(dec!(100)),
            Size::new(dec!(0.0001)),
            Price::new(dec!(0.01)),
        )
        .unwrap();
        let result = OrderManager::with_rules(
            config(Size::ZERO),
            rules,
            Arc::new(MockExchange::new()),
        );
        assert!(matches!(result, Err(OrderError::Config(_))));
    }
}
