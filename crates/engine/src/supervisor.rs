// In crates/engine/src/supervisor.rs

use crate::aggregator::aggregate;
use crate::dispatcher::SignalDispatcher;
use crate::state::StrategyRuntimeState;
use crate::transport::BarTransport;
use crate::{Error, Result};
use core_types::{Bar, SignalInstruction, StrategyConfig, StrategyId, Symbol};
use execution::{OrderManager, OrderOutcome};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Authenticating,
    Subscribed,
    Fatal,
}

/// Owns the live subscription and every strategy instance's runtime state.
///
/// Bars are handled one at a time, in arrival order. Orders are issued
/// inline, so no further bars are read while an order call is outstanding.
pub struct StreamSupervisor<T> {
    transport: T,
    states: BTreeMap<StrategyId, StrategyRuntimeState>,
    symbols: Vec<Symbol>,
    dispatcher: SignalDispatcher,
    orders: OrderManager,
    connection: ConnectionState,
    reconnect_delay: Duration,
    resubscribe_backoff: Duration,
}

impl<T: BarTransport> StreamSupervisor<T> {
    pub fn new(
        transport: T,
        configs: Vec<StrategyConfig>,
        dispatcher: SignalDispatcher,
        orders: OrderManager,
        reconnect_delay: Duration,
        resubscribe_backoff: Duration,
    ) -> Self {
        let mut symbols: Vec<Symbol> = configs.iter().map(|c| c.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();

        let states = configs
            .into_iter()
            .map(|config| (config.id, StrategyRuntimeState::new(config)))
            .collect();

        Self {
            transport,
            states,
            symbols,
            dispatcher,
            orders,
            connection: ConnectionState::Disconnected,
            reconnect_delay,
            resubscribe_backoff,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn state(&self, strategy_id: StrategyId) -> Option<&StrategyRuntimeState> {
        self.states.get(&strategy_id)
    }

    pub fn configs(&self) -> impl Iterator<Item = &StrategyConfig> {
        self.states.values().map(StrategyRuntimeState::config)
    }

    /// Adds historical bars to one instance's buffer without evaluating.
    /// Returns how many were new.
    pub fn seed(&mut self, strategy_id: StrategyId, bars: Vec<Bar>) -> usize {
        let Some(state) = self.states.get_mut(&strategy_id) else {
            return 0;
        };
        bars.into_iter().map(|bar| state.ingest(bar)).filter(|inserted| *inserted).count()
    }

    /// Connects, then consumes bars until an abnormal closure.
    ///
    /// A normal closure waits `reconnect_delay` and resubscribes, retrying
    /// every `resubscribe_backoff` until it succeeds. An abnormal closure is
    /// returned as `FatalTransport`.
    pub async fn run(&mut self) -> Result<()> {
        if let Err(e) = self.connect().await {
            self.connection = ConnectionState::Fatal;
            tracing::error!(error = %e, "Initial stream connection failed.");
            return Err(Error::FatalTransport(format!("initial connection failed: {}", e)));
        }

        loop {
            match self.transport.receive_next().await {
                Ok(bars) => {
                    for bar in bars {
                        self.handle_bar(bar).await;
                    }
                }
                Err(api_client::Error::StreamClosed { normal: true }) => {
                    self.connection = ConnectionState::Disconnected;
                    tracing::warn!(
                        delay_secs = self.reconnect_delay.as_secs(),
                        "Stream closed normally; resubscribing."
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                    self.resubscribe().await;
                }
                Err(api_client::Error::StreamClosed { normal: false }) => {
                    self.connection = ConnectionState::Fatal;
                    tracing::error!("Stream closed abnormally; stopping.");
                    return Err(Error::FatalTransport("abnormal stream closure".to_string()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable stream message skipped.");
                }
            }
        }
    }

    async fn connect(&mut self) -> api_client::Result<()> {
        self.connection = ConnectionState::Authenticating;
        tracing::info!("Stream state: Authenticating.");
        self.transport.login().await?;
        self.transport.subscribe(&self.symbols).await?;
        self.connection = ConnectionState::Subscribed;
        tracing::info!(symbols = self.symbols.len(), "Stream state: Subscribed.");
        Ok(())
    }

    async fn resubscribe(&mut self) {
        loop {
            match self.connect().await {
                Ok(()) => return,
                Err(e) => {
                    self.connection = ConnectionState::Disconnected;
                    tracing::warn!(
                        error = %e,
                        backoff_secs = self.resubscribe_backoff.as_secs(),
                        "Resubscribe failed; retrying."
                    );
                    tokio::time::sleep(self.resubscribe_backoff).await;
                }
            }
        }
    }

    /// Routes one bar to every instance trading its symbol.
    pub async fn handle_bar(&mut self, bar: Bar) {
        let minute = bar.minute_of_day();
        let mut due = Vec::new();

        for (id, state) in self.states.iter_mut() {
            if state.config().symbol != bar.symbol {
                continue;
            }
            if !state.ingest(bar.clone()) {
                tracing::debug!(strategy_id = %id, timestamp = %bar.timestamp, "Duplicate bar ignored.");
                continue;
            }
            if !state.boundary_reached() {
                if !state.observe_boundary(minute) {
                    continue;
                }
                tracing::info!(
                    strategy_id = %id,
                    symbol = %bar.symbol,
                    timeframe = state.config().timeframe_minutes,
                    timestamp = %bar.timestamp,
                    "Timeframe boundary reached; processing enabled."
                );
            }
            if state.is_due(minute) {
                due.push(*id);
            }
        }

        for id in due {
            self.evaluate(id).await;
        }
    }

    async fn evaluate(&self, strategy_id: StrategyId) {
        let Some(state) = self.states.get(&strategy_id) else {
            return;
        };
        let config = state.config();

        let series = match aggregate(state.buffer().bars(), config.timeframe_minutes) {
            Ok(series) => series,
            Err(e) => {
                tracing::error!(strategy_id = %strategy_id, error = %e, "Aggregation failed.");
                return;
            }
        };
        if series.is_empty() {
            tracing::debug!(strategy_id = %strategy_id, "Not enough bars to aggregate yet.");
            return;
        }

        let signal = self.dispatcher.dispatch(config, &series);
        if signal.instruction == SignalInstruction::None {
            return;
        }

        tracing::info!(
            strategy_id = %strategy_id,
            name = %config.name,
            instruction = ?signal.instruction,
            quantity = %signal.quantity,
            price = %signal.price,
            "Signal emitted."
        );
        match self.orders.execute(config, &signal).await {
            Ok(OrderOutcome::Bought(order_id)) => {
                tracing::info!(strategy_id = %strategy_id, order_id = %order_id, "BUY complete.");
            }
            Ok(OrderOutcome::Sold(summary)) => {
                tracing::info!(
                    strategy_id = %strategy_id,
                    sold = summary.sold.len(),
                    cancelled = summary.cancelled.len(),
                    failed = summary.failed.len(),
                    "SELL cycle complete."
                );
            }
            Err(e) => {
                tracing::error!(strategy_id = %strategy_id, error = %e, "Order handling failed.");
            }
        }
    }
}
