// In crates/app-config/src/lib.rs

use config::{Config, Environment, File, FileFormat};
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::Settings;

/// Loads the application settings from the `config/` directory.
///
/// See [`load_settings_from_dir`] for the layering rules.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_dir(Path::new("config"))
}

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `production.toml`).
/// 3. Merges settings from environment variables (e.g., `APP_BROKER__APP_KEY=...`).
pub fn load_settings_from_dir(dir: &Path) -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let config = Config::builder()
        .add_source(File::with_name(&dir.join("base").to_string_lossy()))
        .add_source(File::with_name(&dir.join(&environment).to_string_lossy()).required(false))
        // The prefix is `APP`, separator is `__`.
        .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"))
        .build()?;

    finish(config)
}

/// Parses settings from an in-memory TOML document. Environment variables are not consulted.
pub fn settings_from_toml(content: &str) -> Result<Settings> {
    let config = Config::builder()
        .add_source(File::from_str(content, FileFormat::Toml))
        .build()?;

    finish(config)
}

fn finish(config: Config) -> Result<Settings> {
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
