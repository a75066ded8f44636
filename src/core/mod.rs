//! Ambient types for the rollup engine: configuration, errors and the
//! point/retention data model.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{reload_rules, Config, ConfigBuilder, LogLevel, RulesWatcher};
pub use error::{Result, RollupError};
pub use types::{Point, Retention};
