use app_config::types::StreamSettings;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use core_types::{
    ActivePosition, AggregatedBar, Bar, Instruction, OrderId, OrderType, StrategyConfig,
    StrategyId, Symbol,
};
use database::PositionStore;
use engine::{BarTransport, ConnectionState, Engine, Error, HistorySource};
use execution::{OrderManager, PaperBroker};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strategies::{EvaluatedBar, Strategy, StrategyRegistry};

enum Event {
    Bars(Vec<Bar>),
    Closed { normal: bool },
}

#[derive(Default)]
struct Counters {
    logins: usize,
    subscriptions: Vec<Vec<Symbol>>,
    /// 1-based login attempts that should be refused.
    refused_logins: Vec<usize>,
}

/// Plays back a fixed script, then closes abnormally.
struct ScriptedTransport {
    script: VecDeque<Event>,
    counters: Arc<Mutex<Counters>>,
}

#[async_trait]
impl BarTransport for ScriptedTransport {
    async fn login(&mut self) -> api_client::Result<()> {
        let mut counters = self.counters.lock().unwrap();
        counters.logins += 1;
        if counters.refused_logins.contains(&counters.logins) {
            return Err(api_client::Error::Stream("login refused".to_string()));
        }
        Ok(())
    }

    async fn subscribe(&mut self, symbols: &[Symbol]) -> api_client::Result<()> {
        self.counters.lock().unwrap().subscriptions.push(symbols.to_vec());
        Ok(())
    }

    async fn receive_next(&mut self) -> api_client::Result<Vec<Bar>> {
        match self.script.pop_front() {
            Some(Event::Bars(bars)) => Ok(bars),
            Some(Event::Closed { normal }) => Err(api_client::Error::StreamClosed { normal }),
            None => Err(api_client::Error::StreamClosed { normal: false }),
        }
    }
}

/// Signals BUY on every evaluation.
struct AlwaysBuy;

impl Strategy for AlwaysBuy {
    fn name(&self) -> &'static str {
        "always_buy"
    }

    fn evaluate(&self, series: &[AggregatedBar]) -> anyhow::Result<Vec<EvaluatedBar>> {
        let mut rows: Vec<_> = series.iter().map(EvaluatedBar::quiet).collect();
        if let Some(last) = rows.last_mut() {
            last.signal = Some(Instruction::Buy);
            last.quantity = Decimal::ONE;
        }
        Ok(rows)
    }
}

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<ActivePosition>>,
}

impl MemoryStore {
    fn count(&self, strategy_id: i64) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.strategy_id == StrategyId(strategy_id))
            .count()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn insert_active_position(&self, position: &ActivePosition) -> database::Result<()> {
        self.rows.lock().unwrap().push(position.clone());
        Ok(())
    }

    async fn list_order_ids(&self, strategy_id: StrategyId) -> database::Result<Vec<OrderId>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.strategy_id == strategy_id)
            .map(|p| p.order_id.clone())
            .collect())
    }

    async fn delete_active_positions(&self, strategy_id: StrategyId) -> database::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|p| p.strategy_id != strategy_id);
        Ok((before - rows.len()) as u64)
    }
}

fn at(minute_of_hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap() + ChronoDuration::minutes(minute_of_hour)
}

fn bar(symbol: &str, minute_of_hour: i64) -> Bar {
    let price = Decimal::from(100 + minute_of_hour);
    Bar {
        symbol: Symbol::new(symbol),
        open: price,
        high: price,
        low: price,
        close: price,
        volume: Decimal::from(10),
        timestamp: at(minute_of_hour),
    }
}

fn config(id: i64, symbol: &str, timeframe_minutes: u32) -> StrategyConfig {
    StrategyConfig {
        id: StrategyId(id),
        name: "always_buy".to_string(),
        symbol: Symbol::new(symbol),
        timeframe_minutes,
        lookback_days: 1,
        extended_hours: false,
        order_type: OrderType::Limit,
    }
}

fn registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register("always_buy", Arc::new(AlwaysBuy));
    registry
}

struct Harness {
    engine: Engine<ScriptedTransport>,
    counters: Arc<Mutex<Counters>>,
    store: Arc<MemoryStore>,
}

fn harness(configs: Vec<StrategyConfig>, script: Vec<Event>, refused_logins: Vec<usize>) -> Harness {
    let counters = Arc::new(Mutex::new(Counters {
        refused_logins,
        ..Default::default()
    }));
    let store = Arc::new(MemoryStore::default());
    let orders = OrderManager::new(
        Arc::new(PaperBroker::new()),
        store.clone(),
        Duration::from_secs(30),
        1440,
    );
    let transport = ScriptedTransport {
        script: script.into(),
        counters: counters.clone(),
    };
    let stream = StreamSettings {
        reconnect_delay_secs: 1,
        resubscribe_backoff_secs: 5,
    };
    let engine = Engine::new(configs, registry(), orders, transport, &stream).unwrap();
    Harness {
        engine,
        counters,
        store,
    }
}

#[tokio::test]
async fn nothing_is_evaluated_before_the_boundary_latch() {
    let mut h = harness(vec![config(1, "SPY", 5)], Vec::new(), Vec::new());
    let supervisor = h.engine.supervisor_mut();

    // 14:34 would be an evaluation minute, but no boundary has been seen.
    for minute in 31..=34 {
        supervisor.handle_bar(bar("SPY", minute)).await;
    }
    let state = supervisor.state(StrategyId(1)).unwrap();
    assert!(!state.boundary_reached());
    assert_eq!(state.buffer().len(), 4);
    assert_eq!(h.store.count(1), 0);

    // 14:35 latches; 14:39 completes the 14:35 bucket and is due.
    for minute in 35..=39 {
        supervisor.handle_bar(bar("SPY", minute)).await;
    }
    assert!(supervisor.state(StrategyId(1)).unwrap().boundary_reached());
    assert_eq!(h.store.count(1), 1);
}

#[tokio::test]
async fn redelivered_bars_are_ignored() {
    let mut h = harness(vec![config(1, "SPY", 5)], Vec::new(), Vec::new());
    let supervisor = h.engine.supervisor_mut();

    for minute in 35..=39 {
        supervisor.handle_bar(bar("SPY", minute)).await;
    }
    assert_eq!(h.store.count(1), 1);

    supervisor.handle_bar(bar("SPY", 39)).await;
    supervisor.handle_bar(bar("SPY", 37)).await;

    assert_eq!(supervisor.state(StrategyId(1)).unwrap().buffer().len(), 5);
    assert_eq!(h.store.count(1), 1);
}

#[tokio::test]
async fn instances_on_one_symbol_keep_separate_state() {
    let mut h = harness(
        vec![config(1, "SPY", 5), config(2, "SPY", 15), config(3, "QQQ", 5)],
        Vec::new(),
        Vec::new(),
    );
    let supervisor = h.engine.supervisor_mut();

    // 14:35 is a 5-minute boundary but not a 15-minute one.
    for minute in 35..=44 {
        supervisor.handle_bar(bar("SPY", minute)).await;
    }

    assert!(supervisor.state(StrategyId(1)).unwrap().boundary_reached());
    assert!(!supervisor.state(StrategyId(2)).unwrap().boundary_reached());
    assert_eq!(supervisor.state(StrategyId(2)).unwrap().buffer().len(), 10);
    assert!(supervisor.state(StrategyId(3)).unwrap().buffer().is_empty());
    // Evaluated at 14:39 and 14:44.
    assert_eq!(h.store.count(1), 2);
    assert_eq!(h.store.count(2), 0);
}

#[tokio::test(start_paused = true)]
async fn normal_closure_resubscribes_once_and_keeps_consuming() {
    let script = vec![
        Event::Bars((35..=37).map(|m| bar("SPY", m)).collect()),
        Event::Closed { normal: true },
        Event::Bars((38..=39).map(|m| bar("SPY", m)).collect()),
    ];
    let h = harness(vec![config(1, "SPY", 5)], script, Vec::new());

    let result = h.engine.run().await;

    // The script ends with an abnormal closure.
    assert!(matches!(result, Err(Error::FatalTransport(_))));
    let counters = h.counters.lock().unwrap();
    assert_eq!(counters.logins, 2);
    assert_eq!(counters.subscriptions, vec![vec![Symbol::new("SPY")]; 2]);
    // Bars after the reconnect completed the bucket.
    assert_eq!(h.store.count(1), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_resubscribe_is_retried() {
    let script = vec![Event::Closed { normal: true }];
    let h = harness(vec![config(1, "SPY", 5)], script, vec![2, 3]);

    let result = h.engine.run().await;

    assert!(matches!(result, Err(Error::FatalTransport(_))));
    let counters = h.counters.lock().unwrap();
    assert_eq!(counters.logins, 4);
    assert_eq!(counters.subscriptions.len(), 2);
}

#[tokio::test]
async fn abnormal_closure_is_fatal() {
    let script = vec![Event::Closed { normal: false }, Event::Bars(vec![bar("SPY", 35)])];
    let mut h = harness(vec![config(1, "SPY", 5)], script, Vec::new());
    let supervisor = h.engine.supervisor_mut();

    let result = supervisor.run().await;

    assert!(matches!(result, Err(Error::FatalTransport(_))));
    assert_eq!(supervisor.connection_state(), ConnectionState::Fatal);
    assert!(supervisor.state(StrategyId(1)).unwrap().buffer().is_empty());
    assert_eq!(h.counters.lock().unwrap().logins, 1);
}

#[tokio::test]
async fn initial_login_failure_is_fatal() {
    let h = harness(vec![config(1, "SPY", 5)], Vec::new(), vec![1]);
    assert!(matches!(h.engine.run().await, Err(Error::FatalTransport(_))));
}

#[test]
fn unresolved_strategies_are_reported_per_item() {
    let mut unknown_a = config(1, "SPY", 5);
    unknown_a.name = "momentum".to_string();
    let mut unknown_b = config(2, "QQQ", 5);
    unknown_b.name = "breakout".to_string();

    let orders = OrderManager::new(
        Arc::new(PaperBroker::new()),
        Arc::new(MemoryStore::default()),
        Duration::from_secs(30),
        1440,
    );
    let transport = ScriptedTransport {
        script: VecDeque::new(),
        counters: Arc::default(),
    };
    let stream = StreamSettings {
        reconnect_delay_secs: 1,
        resubscribe_backoff_secs: 5,
    };

    match Engine::new(vec![unknown_a, unknown_b], registry(), orders, transport, &stream) {
        Err(Error::Startup(problems)) => assert_eq!(problems.len(), 2),
        _ => panic!("expected a startup failure"),
    }
}

struct FixedHistory;

#[async_trait]
impl HistorySource for FixedHistory {
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        _lookback_days: u32,
        _extended_hours: bool,
    ) -> api_client::Result<Vec<Bar>> {
        if symbol.as_str() == "QQQ" {
            return Err(api_client::Error::ApiError {
                status: 500,
                msg: "unavailable".to_string(),
            });
        }
        Ok((20..30).map(|m| bar("SPY", m)).collect())
    }
}

#[tokio::test]
async fn seeding_fills_buffers_without_evaluating() {
    let h = harness(vec![config(1, "SPY", 5), config(2, "QQQ", 5)], Vec::new(), Vec::new());
    let mut engine = h.engine;

    engine.seed_history(&FixedHistory).await;

    let spy = engine.supervisor().state(StrategyId(1)).unwrap();
    assert_eq!(spy.buffer().len(), 10);
    assert!(!spy.boundary_reached());
    assert!(engine.supervisor().state(StrategyId(2)).unwrap().buffer().is_empty());
    assert_eq!(h.store.count(1), 0);
}
