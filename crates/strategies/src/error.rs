// In crates/strategies/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No strategy named '{0}' is available")]
    UnknownStrategy(String),

    #[error("Invalid settings for strategy '{name}': {reason}")]
    InvalidSettings { name: String, reason: String },

    #[error("Strategy '{name}' failed to evaluate: {reason}")]
    Evaluation { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
