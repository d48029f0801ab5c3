// In crates/execution/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid order request: {0}")]
    InvalidOrderRequest(String),

    #[error("Unrecognized instruction: {0}")]
    InvalidInstruction(String),

    #[error("Broker call '{operation}' timed out")]
    Timeout { operation: &'static str },

    #[error("Broker error: {0}")]
    Broker(#[from] api_client::Error),

    #[error("Position store error: {0}")]
    Store(#[from] database::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
