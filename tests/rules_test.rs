//! Rule resolution, precision selection and rollup behaviour.

mod common;

use common::{points, series, TestRulesBuilder, METRIC_ID};
use pretty_assertions::assert_eq;
use rollup_lib::core::{Point, Retention, RollupError};
use rollup_lib::rollup::{
    AggregationRegistry, RawPattern, Rules, RulesHandle, DEFAULT_AGGREGATION, DEFAULT_RETENTION,
    EMPTY_PRECISION,
};

fn two_tier(now: u32) -> Rules {
    TestRulesBuilder::new(now)
        .pattern(
            RawPattern::catch_all()
                .function("avg")
                .retention(0, 10)
                .retention(3600, 60),
        )
        .build()
}

#[test]
fn test_catch_all_applies_to_every_metric() {
    let rules = TestRulesBuilder::new(0)
        .pattern(RawPattern::catch_all().function("sum").retention(0, 30))
        .build();

    for metric in ["a", "carbon.agents.host1.cpu", "", "servers.web-01.load.1m"] {
        let resolved = rules.match_metric(metric);
        assert_eq!(resolved.aggregation.map(|a| a.name()), Some("sum"));
        assert_eq!(resolved.retention, &[Retention::new(0, 30)]);
    }
}

#[test]
fn test_earlier_pattern_wins_aggregation() {
    let rules = TestRulesBuilder::new(0)
        .pattern(RawPattern::catch_all().regexp(r"\.cpu$").function("max"))
        .pattern(
            RawPattern::catch_all()
                .regexp(r"^servers\.")
                .function("min")
                .retention(0, 5),
        )
        .pattern(RawPattern::catch_all().function("avg").retention(0, 60))
        .build();

    let resolved = rules.match_metric("servers.web1.cpu");
    assert_eq!(resolved.aggregation.map(|a| a.name()), Some("max"));
    assert_eq!(resolved.retention, &[Retention::new(0, 5)]);

    let resolved = rules.match_metric("servers.web1.mem");
    assert_eq!(resolved.aggregation.map(|a| a.name()), Some("min"));
    assert_eq!(resolved.retention, &[Retention::new(0, 5)]);

    let resolved = rules.match_metric("other.mem");
    assert_eq!(resolved.aggregation.map(|a| a.name()), Some("avg"));
    assert_eq!(resolved.retention, &[Retention::new(0, 60)]);
}

#[test]
fn test_fallbacks_without_matching_patterns() {
    let rules = TestRulesBuilder::new(10_000).build();

    let resolved = rules.match_metric("anything");
    assert_eq!(resolved.aggregation.map(|a| a.name()), Some(DEFAULT_AGGREGATION));
    assert_eq!(resolved.retention, &DEFAULT_RETENTION);

    let mut pts = points(&[(9_000, 1.0), (9_010, 2.0), (9_070, 5.0)]);
    let precision = rules.rollup_metric("anything", 9_000, &mut pts).unwrap();
    assert_eq!(precision, 60);
    assert_eq!(pts, points(&[(9_000, 1.5), (9_060, 5.0)]));
}

#[test]
fn test_match_is_deterministic() {
    let rules = two_tier(0);
    let first = rules.match_metric("a.b.c");
    for _ in 0..10 {
        let again = rules.match_metric("a.b.c");
        assert_eq!(again.retention, first.retention);
        assert_eq!(
            again.aggregation.map(|a| a.name()),
            first.aggregation.map(|a| a.name())
        );
    }
}

#[test]
fn test_step_by_age() {
    let rules = two_tier(10_000);

    // 5000 + 3600 <= 10000: the coarser tier is due
    assert_eq!(rules.step("m", 5_000).unwrap(), 60);
    // 6401 + 3600 > 10000: still within the base tier
    assert_eq!(rules.step("m", 6_401).unwrap(), 10);
    assert_eq!(rules.step("m", 6_400).unwrap(), 60);
    assert_eq!(rules.step("m", 10_000).unwrap(), 10);
}

#[test]
fn test_step_last_tier_is_fallback() {
    let rules = TestRulesBuilder::new(1_000_000)
        .pattern(
            RawPattern::catch_all()
                .retention(0, 1)
                .retention(60, 10)
                .retention(3600, 60),
        )
        .build();

    assert_eq!(rules.step("m", 0).unwrap(), 60);
    assert_eq!(rules.step("m", 999_950).unwrap(), 1);
    assert_eq!(rules.step("m", 999_900).unwrap(), 10);
}

#[test]
fn test_rollup_cascades_through_due_tiers() {
    let rules = two_tier(10_000);
    let mut pts = series(5_000, 5_120, 5);

    let precision = rules.rollup_metric("m", 5_000, &mut pts).unwrap();

    assert_eq!(precision, 60);
    assert_eq!(pts, points(&[(4_980, 3.5), (5_040, 13.5), (5_100, 21.5)]));
}

#[test]
fn test_rollup_recent_data_uses_base_tier() {
    let rules = two_tier(10_000);
    let mut pts = series(9_900, 9_940, 5);

    let precision = rules.rollup_metric("m", 9_900, &mut pts).unwrap();

    assert_eq!(precision, 10);
    assert_eq!(
        pts,
        points(&[(9_900, 0.5), (9_910, 2.5), (9_920, 4.5), (9_930, 6.5)])
    );
}

#[test]
fn test_rollup_empty_points() {
    for rules in [two_tier(10_000), TestRulesBuilder::new(0).build()] {
        let mut pts: Vec<Point> = Vec::new();
        let precision = rules.rollup_metric("m", 0, &mut pts).unwrap();
        assert_eq!(precision, EMPTY_PRECISION);
        assert!(pts.is_empty());
    }
}

#[test]
fn test_rollup_keeps_metric_id() {
    let rules = two_tier(10_000);
    let mut pts = series(0, 600, 1);

    rules.rollup_metric("m", 0, &mut pts).unwrap();

    assert_eq!(pts.len(), 10);
    assert!(pts.iter().all(|p| p.metric_id == METRIC_ID));
}

#[test]
fn test_invalid_regexp_stops_compilation() {
    let err = TestRulesBuilder::new(0)
        .pattern(RawPattern::catch_all().function("avg"))
        .pattern(RawPattern::catch_all().regexp("[z-a]"))
        .pattern(RawPattern::catch_all().function("no-such-function"))
        .try_build()
        .unwrap_err();

    assert!(matches!(err, RollupError::InvalidPattern { .. }));
    assert!(err.is_compile_error());
}

#[test]
fn test_unknown_function_fails_compilation() {
    let err = TestRulesBuilder::new(0)
        .pattern(RawPattern::catch_all().regexp("^a").function("median"))
        .try_build()
        .unwrap_err();

    assert!(matches!(err, RollupError::UnknownAggregation(ref name) if name == "median"));
}

#[test]
fn test_custom_function() {
    fn spread(points: &[Point]) -> f64 {
        let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        let min = points.iter().map(|p| p.value).fold(f64::MAX, f64::min);
        max - min
    }

    let mut registry = AggregationRegistry::new();
    registry.register("spread", spread);

    let rules = TestRulesBuilder::new(100)
        .registry(registry)
        .pattern(RawPattern::catch_all().function("spread").retention(0, 60))
        .build();

    let mut pts = points(&[(0, 3.0), (10, 9.0), (20, 4.0), (60, 1.0)]);
    rules.rollup_metric("m", 0, &mut pts).unwrap();

    assert_eq!(pts, points(&[(0, 6.0), (60, 1.0)]));
}

#[test]
fn test_concurrent_readers_see_whole_rule_sets() {
    let handle = RulesHandle::new(
        TestRulesBuilder::new(10_000)
            .pattern(RawPattern::catch_all().function("sum").retention(0, 60))
            .build(),
    );

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let handle = handle.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let rules = handle.load();
                    let mut pts = points(&[(0, 1.0), (30, 2.0)]);
                    let precision = rules.rollup_metric("m", 0, &mut pts).unwrap();
                    match precision {
                        60 => assert_eq!(pts, points(&[(0, 3.0)])),
                        600 => assert_eq!(pts, points(&[(0, 2.0)])),
                        other => panic!("unexpected precision {other}"),
                    }
                }
            });
        }

        scope.spawn(|| {
            for _ in 0..50 {
                handle.store(
                    TestRulesBuilder::new(10_000)
                        .pattern(RawPattern::catch_all().function("max").retention(0, 600))
                        .build(),
                );
            }
        });
    });

    assert_eq!(handle.load().step("m", 0).unwrap(), 600);
}
