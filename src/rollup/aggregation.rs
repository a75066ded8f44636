//! Named aggregation functions used to merge points that share a bucket.
//!
//! Patterns never hold a function value directly: compiling a pattern
//! resolves its function name to an [`AggregationRef`], an index into the
//! registry the rule set was compiled against.

use crate::core::Point;
use std::fmt;

/// Name of the function used when no pattern supplies one.
pub const DEFAULT_AGGREGATION: &str = "avg";

/// Reduces a contiguous run of points to a single value.
///
/// Only ever called with two or more points.
pub type Reducer = fn(&[Point]) -> f64;

/// Resolved reference to an entry of an [`AggregationRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregationRef(usize);

/// Registered aggregation function
#[derive(Clone)]
pub struct Aggregation {
    name: String,
    reduce: Reducer,
}

impl Aggregation {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn reduce(&self, points: &[Point]) -> f64 {
        (self.reduce)(points)
    }
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregation").field("name", &self.name).finish()
    }
}

/// Lookup table from function name to reducer
#[derive(Debug, Clone)]
pub struct AggregationRegistry {
    entries: Vec<Aggregation>,
}

impl AggregationRegistry {
    /// Registry with the built-in functions: `avg`, `sum`, `min`, `max`,
    /// `any`, `anyFirst` and `anyLast`.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(8),
        };
        registry.register(DEFAULT_AGGREGATION, avg);
        registry.register("sum", sum);
        registry.register("min", min);
        registry.register("max", max);
        registry.register("any", any_first);
        registry.register("anyFirst", any_first);
        registry.register("anyLast", any_last);
        registry
    }

    /// Register `reduce` under `name`, replacing any function of that name.
    ///
    /// Replacing keeps the existing reference valid for rule sets compiled
    /// later; already compiled rule sets own their own copy of the registry.
    pub fn register(&mut self, name: &str, reduce: Reducer) -> AggregationRef {
        if let Some(existing) = self.lookup(name) {
            self.entries[existing.0].reduce = reduce;
            return existing;
        }

        self.entries.push(Aggregation {
            name: name.to_string(),
            reduce,
        });
        AggregationRef(self.entries.len() - 1)
    }

    pub fn lookup(&self, name: &str) -> Option<AggregationRef> {
        self.entries
            .iter()
            .position(|entry| entry.name == name)
            .map(AggregationRef)
    }

    /// Resolve a reference obtained from this registry.
    ///
    /// # Panics
    ///
    /// Panics if `aggr` was handed out by a different, larger registry.
    pub fn get(&self, aggr: AggregationRef) -> &Aggregation {
        &self.entries[aggr.0]
    }

    /// Names of all registered functions, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Aggregation::name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AggregationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn avg(points: &[Point]) -> f64 {
    sum(points) / points.len() as f64
}

fn sum(points: &[Point]) -> f64 {
    points.iter().map(|p| p.value).sum()
}

fn min(points: &[Point]) -> f64 {
    points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min)
}

fn max(points: &[Point]) -> f64 {
    points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max)
}

fn any_first(points: &[Point]) -> f64 {
    points.first().map_or(0.0, |p| p.value)
}

fn any_last(points: &[Point]) -> f64 {
    points.last().map_or(0.0, |p| p.value)
}
