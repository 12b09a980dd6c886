//! # Shellmatch Common Library
//!
//! Shared code for the shellmatch services:
//! - Error and result types
//! - Bootstrap configuration loading (TOML + environment)
//! - Batch progress events and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, MatchEvent, MatchPhase};
