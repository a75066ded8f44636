//! Compiled rule set: resolves a metric to its aggregation and retention,
//! picks precisions by data age and drives compaction across tiers.

use crate::core::{Point, Result, Retention, RollupError};
use crate::rollup::aggregation::{
    Aggregation, AggregationRef, AggregationRegistry, DEFAULT_AGGREGATION,
};
use crate::rollup::clock::{Clock, SystemClock};
use crate::rollup::compact::compact;
use crate::rollup::pattern::{Pattern, RawPattern};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Retention used when no pattern supplies one. Well-formed configuration
/// always ends with a catch-all pattern, so this should never be hit.
pub static DEFAULT_RETENTION: [Retention; 1] = [Retention::new(0, 60)];

/// Precision reported for an empty point set
pub const EMPTY_PRECISION: u32 = 1;

/// Rule set as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRules {
    /// Patterns in precedence order
    pub pattern: Vec<RawPattern>,
    /// Unix timestamp of the last rule change
    pub updated: i64,
}

/// Effective rule for one metric.
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub aggregation: Option<&'a Aggregation>,
    pub retention: &'a [Retention],
}

/// Points of one metric queued for [`Rules::rollup_many`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub metric: String,
    pub from: u32,
    pub points: Vec<Point>,
}

impl MetricBatch {
    pub fn new<S: Into<String>>(metric: S, from: u32, points: Vec<Point>) -> Self {
        Self {
            metric: metric.into(),
            from,
            points,
        }
    }
}

/// Compiled, immutable rule set. Safe to share between threads.
pub struct Rules {
    patterns: Vec<Pattern>,
    updated: i64,
    registry: Arc<AggregationRegistry>,
    default_aggr: Option<AggregationRef>,
    clock: Arc<dyn Clock>,
}

impl Rules {
    /// Compile against the built-in functions and the wall clock.
    pub fn compile(raw: RawRules) -> Result<Self> {
        Self::compile_with(raw, Arc::new(AggregationRegistry::new()), Arc::new(SystemClock))
    }

    /// Compile every pattern in order, stopping at the first failure.
    pub fn compile_with(
        raw: RawRules,
        registry: Arc<AggregationRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let patterns = raw
            .pattern
            .into_iter()
            .map(|p| Pattern::compile(p, &registry))
            .collect::<Result<Vec<_>>>()?;

        if !patterns
            .iter()
            .any(|p| p.is_catch_all() && !p.retention().is_empty())
        {
            tracing::warn!(
                "No catch-all pattern with retention; unmatched metrics fall back to {}s precision",
                DEFAULT_RETENTION[0].precision
            );
        }

        tracing::debug!(patterns = patterns.len(), updated = raw.updated, "Compiled rollup rules");

        let default_aggr = registry.lookup(DEFAULT_AGGREGATION);

        Ok(Self {
            patterns,
            updated: raw.updated,
            registry,
            default_aggr,
            clock,
        })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn updated(&self) -> i64 {
        self.updated
    }

    pub fn registry(&self) -> &AggregationRegistry {
        &self.registry
    }

    /// Resolve the aggregation and retention for `metric`.
    ///
    /// The first matching pattern with a function supplies the aggregation
    /// and, independently, the first matching pattern with retention
    /// supplies the tiers.
    pub fn match_metric(&self, metric: &str) -> RuleMatch<'_> {
        let mut aggr = None;
        let mut retention: &[Retention] = &[];

        for pattern in &self.patterns {
            if !pattern.matches(metric) {
                continue;
            }
            if aggr.is_none() {
                aggr = pattern.aggregation();
            }
            if retention.is_empty() {
                retention = pattern.retention();
            }
            if aggr.is_some() && !retention.is_empty() {
                break;
            }
        }

        let aggr = aggr.or(self.default_aggr);
        if retention.is_empty() {
            retention = &DEFAULT_RETENTION;
        }

        RuleMatch {
            aggregation: aggr.map(|a| self.registry.get(a)),
            retention,
        }
    }

    /// Precision to use for data starting at `from`.
    pub fn step(&self, metric: &str, from: u32) -> Result<u32> {
        let retention = self.match_metric(metric).retention;
        let now = self.clock.now();

        select_precision(retention, from, now)
            .ok_or_else(|| RollupError::RetentionNotFound(metric.to_string()))
    }

    /// Roll up the time-sorted `points` of a single metric in place.
    ///
    /// Every tier that is already due, judged by `from` against the current
    /// time, is applied in order, each on the output of the previous one.
    /// Returns the precision the points settled at.
    pub fn rollup_metric(&self, metric: &str, from: u32, points: &mut Vec<Point>) -> Result<u32> {
        if points.is_empty() {
            return Ok(EMPTY_PRECISION);
        }

        let now = self.clock.now();
        let RuleMatch {
            aggregation,
            retention,
        } = self.match_metric(metric);

        if retention.is_empty() {
            return Err(RollupError::RetentionNotFound(metric.to_string()));
        }
        let aggr = aggregation.ok_or_else(|| RollupError::AggregationNotFound(metric.to_string()))?;

        let before = points.len();
        let mut precision = EMPTY_PRECISION;

        for tier in retention {
            if tier.age != 0 && not_yet_due(from, tier.age, now) {
                break;
            }
            compact(points, tier.precision, aggr);
            precision = tier.precision;
        }

        tracing::debug!(
            metric,
            from,
            now,
            precision,
            function = aggr.name(),
            before,
            after = points.len(),
            "Rolled up metric"
        );

        Ok(precision)
    }

    /// Roll up independent metrics in parallel.
    ///
    /// Results line up with `batches`; a failure for one metric leaves the
    /// others untouched.
    pub fn rollup_many(&self, batches: &mut [MetricBatch]) -> Vec<Result<u32>> {
        batches
            .par_iter_mut()
            .map(|batch| {
                self.rollup_metric(&batch.metric, batch.from, &mut batch.points)
                    .map_err(|e| {
                        tracing::warn!(metric = %batch.metric, category = e.category(), "Rollup failed: {}", e);
                        e
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rules")
            .field("patterns", &self.patterns)
            .field("updated", &self.updated)
            .finish_non_exhaustive()
    }
}

/// True while data starting at `from` is younger than `age`.
///
/// Tier boundaries are anchored to `from`, not to each point's timestamp.
#[inline]
fn not_yet_due(from: u32, age: u32, now: u32) -> bool {
    u64::from(from) + u64::from(age) > u64::from(now)
}

/// Coarsest tier whose successor is not yet due; the last tier otherwise.
fn select_precision(retention: &[Retention], from: u32, now: u32) -> Option<u32> {
    retention
        .iter()
        .zip(retention.iter().skip(1).map(Some).chain(std::iter::once(None)))
        .find(|(_, next)| next.map_or(true, |n| not_yet_due(from, n.age, now)))
        .map(|(tier, _)| tier.precision)
}
