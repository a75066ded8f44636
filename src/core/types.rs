//! Core data types shared by the rule engine and its callers.

use serde::{Deserialize, Serialize};

/// A single stored measurement of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Identifier of the metric the point belongs to
    pub metric_id: u32,
    /// Measured value
    pub value: f64,
    /// Unix timestamp in seconds
    pub time: u32,
}

impl Point {
    pub fn new(metric_id: u32, time: u32, value: f64) -> Self {
        Self {
            metric_id,
            value,
            time,
        }
    }
}

/// One retention tier: data older than `age` seconds is stored at
/// `precision`-second buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Age threshold in seconds
    pub age: u32,
    /// Bucket width in seconds
    pub precision: u32,
}

impl Retention {
    pub const fn new(age: u32, precision: u32) -> Self {
        Self { age, precision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_json_shape() {
        let point = Point::new(7, 1_700_000_000, 1.5);
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["metric_id"], 7);
        assert_eq!(json["time"], 1_700_000_000u32);
        assert_eq!(json["value"], 1.5);
    }

    #[test]
    fn test_retention_from_yaml() {
        let tiers: Vec<Retention> =
            serde_yaml::from_str("[{age: 0, precision: 60}, {age: 86400, precision: 3600}]")
                .unwrap();
        assert_eq!(tiers, vec![Retention::new(0, 60), Retention::new(86400, 3600)]);
    }
}
