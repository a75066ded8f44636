//! Single rollup rule: metric name regexp, aggregation function and
//! retention tiers.

use crate::core::{Result, Retention, RollupError};
use crate::rollup::aggregation::{AggregationRef, AggregationRegistry};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern as written in configuration, before compilation.
///
/// Every field is optional: a pattern without `regexp` matches every metric,
/// and `function` and `retention` are resolved independently across the
/// pattern list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPattern {
    /// Regular expression over metric names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
    /// Aggregation function name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Retention tiers, expected in non-decreasing age order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retention: Vec<Retention>,
}

impl RawPattern {
    /// Pattern matching every metric
    pub fn catch_all() -> Self {
        Self::default()
    }

    pub fn regexp(mut self, regexp: &str) -> Self {
        self.regexp = Some(regexp.to_string());
        self
    }

    pub fn function(mut self, function: &str) -> Self {
        self.function = Some(function.to_string());
        self
    }

    pub fn retention(mut self, age: u32, precision: u32) -> Self {
        self.retention.push(Retention::new(age, precision));
        self
    }

    /// Label used in log lines and error messages
    pub fn label(&self) -> &str {
        non_empty(self.regexp.as_deref()).unwrap_or("<default>")
    }
}

/// Compiled pattern. Immutable once built.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: RawPattern,
    re: Option<Regex>,
    aggr: Option<AggregationRef>,
}

impl Pattern {
    /// Compile the regexp and resolve the function name against `registry`.
    pub fn compile(raw: RawPattern, registry: &AggregationRegistry) -> Result<Self> {
        let re = match non_empty(raw.regexp.as_deref()) {
            Some(text) => Some(Regex::new(text).map_err(|source| RollupError::InvalidPattern {
                pattern: text.to_string(),
                source,
            })?),
            None => None,
        };

        let aggr = match non_empty(raw.function.as_deref()) {
            Some(name) => Some(
                registry
                    .lookup(name)
                    .ok_or_else(|| RollupError::UnknownAggregation(name.to_string()))?,
            ),
            None => None,
        };

        for tier in &raw.retention {
            if tier.precision == 0 {
                return Err(RollupError::invalid_retention(
                    raw.label(),
                    format!("precision must be greater than 0 (age {})", tier.age),
                ));
            }
        }

        if raw.retention.windows(2).any(|w| w[1].age < w[0].age) {
            tracing::warn!(
                pattern = raw.label(),
                "Retention tiers are not in non-decreasing age order; they are applied as written"
            );
        }

        Ok(Self { raw, re, aggr })
    }

    /// True when the pattern has no regexp or the regexp matches `metric`.
    #[inline]
    pub fn matches(&self, metric: &str) -> bool {
        self.re.as_ref().map_or(true, |re| re.is_match(metric))
    }

    pub fn aggregation(&self) -> Option<AggregationRef> {
        self.aggr
    }

    pub fn retention(&self) -> &[Retention] {
        &self.raw.retention
    }

    pub fn is_catch_all(&self) -> bool {
        self.re.is_none()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
