// In crates/engine/src/lib.rs

pub mod aggregator;
pub mod buffer;
pub mod dispatcher;
pub mod error;
pub mod state;
pub mod supervisor;
pub mod transport;

pub use aggregator::aggregate;
pub use dispatcher::SignalDispatcher;
pub use error::{Error, Result};
pub use supervisor::{ConnectionState, StreamSupervisor};
pub use transport::{BarTransport, HistorySource};

use app_config::types::StreamSettings;
use core_types::StrategyConfig;
use execution::OrderManager;
use std::time::Duration;
use strategies::StrategyRegistry;

/// The top-level orchestrator: wires the strategy instances to the stream
/// and runs them until the stream fails.
pub struct Engine<T> {
    supervisor: StreamSupervisor<T>,
}

impl<T: BarTransport> Engine<T> {
    /// Checks that every instance has a resolved strategy and builds the
    /// supervisor. Each problem is reported on its own.
    pub fn new(
        configs: Vec<StrategyConfig>,
        registry: StrategyRegistry,
        orders: OrderManager,
        transport: T,
        stream: &StreamSettings,
    ) -> Result<Self> {
        let mut problems = Vec::new();
        if configs.is_empty() {
            problems.push("no active strategies configured".to_string());
        }
        for config in &configs {
            if let Err(e) = config.validate() {
                problems.push(e.to_string());
            }
            if !registry.contains(&config.name) {
                problems.push(format!(
                    "strategy {} uses unresolved strategy '{}'",
                    config.id, config.name
                ));
            }
        }
        if !problems.is_empty() {
            for problem in &problems {
                tracing::error!(problem = %problem, "Startup check failed.");
            }
            return Err(Error::Startup(problems));
        }

        tracing::info!(
            strategies = configs.len(),
            broker = orders.broker_name(),
            "Initializing trading engine..."
        );
        let supervisor = StreamSupervisor::new(
            transport,
            configs,
            SignalDispatcher::new(registry),
            orders,
            Duration::from_secs(stream.reconnect_delay_secs),
            Duration::from_secs(stream.resubscribe_backoff_secs),
        );
        Ok(Self { supervisor })
    }

    pub fn supervisor(&self) -> &StreamSupervisor<T> {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut StreamSupervisor<T> {
        &mut self.supervisor
    }

    /// Loads each instance's lookback window of one-minute bars.
    ///
    /// A failed fetch is logged and leaves that instance with an empty buffer.
    pub async fn seed_history(&mut self, source: &dyn HistorySource) {
        let configs: Vec<StrategyConfig> = self.supervisor.configs().cloned().collect();
        for config in configs {
            match source
                .minute_bars(&config.symbol, config.lookback_days, config.extended_hours)
                .await
            {
                Ok(bars) => {
                    let added = self.supervisor.seed(config.id, bars);
                    tracing::info!(strategy_id = %config.id, symbol = %config.symbol, bars = added, "History seeded.");
                }
                Err(e) => {
                    tracing::warn!(
                        strategy_id = %config.id,
                        symbol = %config.symbol,
                        error = %e,
                        "History seeding failed; starting with an empty buffer."
                    );
                }
            }
        }
    }

    /// Runs the stream until it fails fatally.
    pub async fn run(mut self) -> Result<()> {
        self.supervisor.run().await
    }
}
