// In app/src/main.rs

use anyhow::{Context, Result, anyhow, bail};
use api_client::{ApiClient, CredentialStore, LiveConnector, TokenRefresher};
use app_config::Settings;
use app_config::types::CredentialSettings;
use clap::{Parser, Subcommand};
use core_types::StrategyId;
use database::SqliteStore;
use engine::Engine;
use execution::{Broker, LiveBroker, OrderManager, PaperBroker};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strategies::StrategyRegistry;
use strategies::factory::create_strategy;
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A live intraday equity trading bot.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Streams live bars and trades every active strategy.
    Run,

    /// Performs one access-token refresh and exits.
    RefreshToken,

    /// Lists the active strategies and whether each one resolves.
    Strategies,

    /// Lists the tracked open orders of one strategy.
    Positions {
        /// The strategy id (the `id` column of `day_trading_strategies`).
        #[arg(short, long)]
        strategy_id: i64,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let cli = Cli::parse();

    let settings = app_config::load_settings().context("Failed to load settings")?;
    init_tracing(&settings.app.log_level);

    tracing::info!(environment = %settings.app.environment, "Starting trading application");

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Run => run_app(settings).await?,
        Commands::RefreshToken => handle_refresh_token(settings).await?,
        Commands::Strategies => handle_strategies(settings).await?,
        Commands::Positions { strategy_id } => handle_positions(settings, strategy_id).await?,
    }

    Ok(())
}

fn init_tracing(log_level: &str) {
    let level = tracing::Level::from_str(log_level).unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Builds a credential store and its refresher for one set of app credentials.
fn credential_refresher(settings: &Settings, credentials: &CredentialSettings) -> Result<TokenRefresher> {
    let store = Arc::new(CredentialStore::from_refresh_token(&credentials.refresh_token));
    let mut refresher = TokenRefresher::new(
        &settings.broker.token_url,
        &credentials.app_key,
        &credentials.secret_key,
        store,
        Duration::from_secs(settings.broker.request_timeout_secs),
    )?
    .with_schedule(
        Duration::from_secs(settings.auth.refresh_interval_minutes * 60),
        Duration::from_secs(settings.auth.retry_delay_secs),
    );
    if let Some(path) = &settings.broker.token_path {
        refresher = refresher.with_token_path(path);
    }
    Ok(refresher)
}

// --- "Run" Subcommand Logic ---

/// Startup sequence followed by the stream loop. Returns only on a fatal error.
async fn run_app(settings: Settings) -> Result<()> {
    // --- 1. Persistence ---
    let store = database::connect(&settings.database).await?;
    tracing::info!("Database connection established and migrations are up-to-date.");

    // --- 2. Credentials ---
    let trading_refresher = credential_refresher(&settings, &settings.trading_credentials())?;
    trading_refresher
        .refresh_once()
        .await
        .context("Initial trading token refresh failed")?;

    // A separate market-data refresher only when its own credentials exist.
    let market_refresher = if settings.market_data.is_some() {
        let refresher = credential_refresher(&settings, &settings.market_data_credentials())?;
        refresher
            .refresh_once()
            .await
            .context("Initial market-data token refresh failed")?;
        Some(refresher)
    } else {
        None
    };

    let api_client = ApiClient::new(&settings.broker, trading_refresher.store().clone())?;
    let market_client = match &market_refresher {
        Some(refresher) => ApiClient::new(&settings.broker, refresher.store().clone())?,
        None => api_client.clone(),
    };

    if !api_client.verify_account().await? {
        bail!("Configured account hash is not linked to these credentials");
    }
    tracing::info!("Brokerage account verified.");

    // --- 3. Strategies ---
    let configs = store.load_active_strategies().await?;
    let registry = StrategyRegistry::resolve(
        configs.iter().map(|c| c.name.as_str()),
        &settings.strategies,
    )
    .map_err(|errors| {
        let problems: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow!("Unresolved strategies: {}", problems.join("; "))
    })?;

    // --- 4. Execution ---
    let broker: Arc<dyn Broker> = if settings.app.live_trading_enabled {
        tracing::warn!("LIVE TRADING IS ENABLED. REAL ORDERS WILL BE PLACED.");
        Arc::new(LiveBroker::new(api_client.clone()))
    } else {
        tracing::info!("Live trading disabled; orders go to the paper broker.");
        Arc::new(PaperBroker::new())
    };
    let orders = OrderManager::new(
        broker,
        Arc::new(store.clone()),
        Duration::from_secs(settings.broker.request_timeout_secs),
        settings.orders.sell_expiry_minutes,
    );

    // --- 5. Engine ---
    let transport = LiveConnector::new(api_client.clone());
    let mut engine = Engine::new(configs, registry, orders, transport, &settings.stream)?;
    engine.seed_history(&market_client).await;

    tokio::spawn(async move { trading_refresher.run().await });
    if let Some(refresher) = market_refresher {
        tokio::spawn(async move { refresher.run().await });
    }

    if let Err(e) = engine.run().await {
        tracing::error!(error = %e, "Trading engine stopped.");
        return Err(e.into());
    }
    Ok(())
}

// --- Maintenance Subcommands ---

async fn handle_refresh_token(settings: Settings) -> Result<()> {
    let refresher = credential_refresher(&settings, &settings.trading_credentials())?;
    refresher.refresh_once().await?;
    let credential = refresher.store().current();
    tracing::info!(expires_at = %credential.expires_at, "Trading token refreshed.");
    if settings.broker.token_path.is_none() {
        tracing::warn!("broker.token_path is not set; the new token was not persisted.");
    }
    Ok(())
}

async fn handle_strategies(settings: Settings) -> Result<()> {
    let store = database::connect(&settings.database).await?;
    let configs = store.load_active_strategies().await?;

    println!(
        "{:>6}  {:<16} {:<8} {:>4}  {:<6}  {}",
        "id", "name", "symbol", "tf", "type", "status"
    );
    for config in &configs {
        let status = match create_strategy(&config.name, &settings.strategies) {
            Ok(_) => "ok".to_string(),
            Err(e) => e.to_string(),
        };
        println!(
            "{:>6}  {:<16} {:<8} {:>4}  {:<6}  {}",
            config.id, config.name, config.symbol, config.timeframe_minutes, config.order_type, status
        );
    }
    Ok(())
}

async fn handle_positions(settings: Settings, strategy_id: i64) -> Result<()> {
    let store: SqliteStore = database::connect(&settings.database).await?;
    let positions = store.list_active_positions(StrategyId(strategy_id)).await?;

    if positions.is_empty() {
        println!("No active positions for strategy {}.", strategy_id);
        return Ok(());
    }
    for position in positions {
        println!(
            "{}  quantity={}  entry_price={}",
            position.order_id, position.quantity, position.entry_price
        );
    }
    Ok(())
}
