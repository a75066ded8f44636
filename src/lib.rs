//! Rollup - retention rules and downsampling for time-series points.
//!
//! Given raw data points of a metric and an ordered set of retention
//! rules, the engine decides which aggregation function and which bucket
//! width apply to data of a given age, and compacts the points accordingly.
//!
//! # Architecture
//!
//! - `rollup`: pattern compilation, rule resolution, precision selection
//!   and compaction
//! - `core`: configuration, errors and the point data model
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```
//! use rollup_lib::core::Point;
//! use rollup_lib::rollup::{RawPattern, RawRules, Rules};
//!
//! let rules = Rules::compile(RawRules {
//!     pattern: vec![RawPattern::catch_all().function("avg").retention(0, 60)],
//!     updated: 0,
//! })?;
//!
//! let mut points = vec![Point::new(1, 120, 1.0), Point::new(1, 150, 3.0)];
//! let precision = rules.rollup_metric("servers.web1.cpu", 0, &mut points)?;
//! assert_eq!(precision, 60);
//! assert_eq!(points, vec![Point::new(1, 120, 2.0)]);
//! # Ok::<(), rollup_lib::core::RollupError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod rollup;

// Re-export core types for convenience
pub use crate::core::{Config, Result, RollupError};
pub use crate::rollup::{Rules, RulesHandle};
