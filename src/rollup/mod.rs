//! Rollup rule engine.
//!
//! A rule set is an ordered list of patterns compiled once from
//! configuration. For any metric it resolves an aggregation function and a
//! list of retention tiers, picks the precision that applies to data of a
//! given age, and compacts raw points into precision-aligned aggregates.
//!
//! Compiled rule sets are immutable and shared between worker threads;
//! replacing one goes through [`RulesHandle`].

pub mod aggregation;
pub mod clock;
pub mod compact;
pub mod handle;
pub mod pattern;
pub mod rules;

pub use aggregation::{Aggregation, AggregationRef, AggregationRegistry, Reducer, DEFAULT_AGGREGATION};
pub use clock::{Clock, FixedClock, SystemClock};
pub use compact::compact;
pub use handle::RulesHandle;
pub use pattern::{Pattern, RawPattern};
pub use rules::{MetricBatch, RawRules, RuleMatch, Rules, DEFAULT_RETENTION, EMPTY_PRECISION};
