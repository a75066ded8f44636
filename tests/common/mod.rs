//! Common test utilities and fixtures.

#![allow(dead_code)]

use rollup_lib::core::{Point, Result};
use rollup_lib::rollup::{AggregationRegistry, FixedClock, RawPattern, RawRules, Rules};
use std::sync::Arc;

/// Metric id used by fixture points
pub const METRIC_ID: u32 = 7;

/// Fixture builder for rule sets evaluated at a fixed time.
pub struct TestRulesBuilder {
    patterns: Vec<RawPattern>,
    registry: AggregationRegistry,
    now: u32,
}

impl TestRulesBuilder {
    pub fn new(now: u32) -> Self {
        Self {
            patterns: Vec::new(),
            registry: AggregationRegistry::new(),
            now,
        }
    }

    pub fn pattern(mut self, pattern: RawPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn registry(mut self, registry: AggregationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn try_build(self) -> Result<Rules> {
        Rules::compile_with(
            RawRules {
                pattern: self.patterns,
                updated: 1_700_000_000,
            },
            Arc::new(self.registry),
            Arc::new(FixedClock(self.now)),
        )
    }

    pub fn build(self) -> Rules {
        self.try_build().unwrap()
    }
}

/// Points of the fixture metric from `(time, value)` pairs.
pub fn points(raw: &[(u32, f64)]) -> Vec<Point> {
    raw.iter()
        .map(|&(time, value)| Point::new(METRIC_ID, time, value))
        .collect()
}

/// One point every `interval` seconds in `[start, end)`, valued by index.
pub fn series(start: u32, end: u32, interval: u32) -> Vec<Point> {
    (start..end)
        .step_by(interval as usize)
        .enumerate()
        .map(|(i, time)| Point::new(METRIC_ID, time, i as f64))
        .collect()
}
