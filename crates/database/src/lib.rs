// In crates/database/src/lib.rs

use app_config::types::DatabaseSettings;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub mod error;
pub mod positions;
pub mod strategy_configs;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use positions::PositionStore;

/// The SQLite-backed store for active positions and strategy configurations.
///
/// No connection is held between calls: every operation opens its own
/// connection and closes it before returning, so many strategies can touch
/// the store with short, interleaved connections.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    options: SqliteConnectOptions,
}

impl SqliteStore {
    /// Builds a store from the configured connection URL.
    ///
    /// # Arguments
    ///
    /// * `settings`: The database configuration settings.
    pub fn new(settings: &DatabaseSettings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)?;
        Ok(Self::with_options(options, settings.busy_timeout_secs))
    }

    /// Builds a store backed by the database file at `path`.
    pub fn at_path(path: impl AsRef<Path>, busy_timeout_secs: u64) -> Self {
        let options = SqliteConnectOptions::new().filename(path);
        Self::with_options(options, busy_timeout_secs)
    }

    fn with_options(options: SqliteConnectOptions, busy_timeout_secs: u64) -> Self {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));
        Self { options }
    }

    /// Opens a fresh connection for a single operation.
    pub(crate) async fn connect(&self) -> Result<SqliteConnection> {
        let conn = self.options.connect().await?;
        Ok(conn)
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<()> {
        let mut conn = self.connect().await?;
        sqlx::migrate!("../../migrations").run(&mut conn).await?;
        close(conn).await;
        tracing::info!("Database schema is up to date.");
        Ok(())
    }
}

/// Connects to the configured database and runs migrations.
pub async fn connect(settings: &DatabaseSettings) -> Result<SqliteStore> {
    let store = SqliteStore::new(settings)?;
    store.migrate().await?;
    Ok(store)
}

/// Closes a connection, logging rather than failing: the operation it
/// served has already completed.
pub(crate) async fn close(conn: SqliteConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "Failed to close database connection cleanly.");
    }
}
