//! Common error types for shellmatch

use thiserror::Error;

/// Common result type for shellmatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across shellmatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
