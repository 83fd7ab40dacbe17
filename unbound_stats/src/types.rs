//! Metric types produced by the normalizer and handed to publishers.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CollectError;

/// One numeric field. Counters are integers, averages/medians and uptime are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, MetricValue::Float(_))
    }
}

/// Flat, normalized field set for one resolver. Ordered so output is stable.
pub type MetricSet = BTreeMap<String, MetricValue>;

/// Result of polling one host once.
#[derive(Debug)]
pub enum CollectionOutcome {
    Success(MetricSet),
    Failure(CollectError),
}
