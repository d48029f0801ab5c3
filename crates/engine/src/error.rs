// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The stream closed abnormally; the process should stop.
    #[error("Fatal transport failure: {0}")]
    FatalTransport(String),

    #[error("Startup failed: {}", .0.join("; "))]
    Startup(Vec<String>),
}

impl From<core_types::Error> for Error {
    fn from(e: core_types::Error) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
