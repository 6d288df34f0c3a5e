//! Severity classification of a single reading.
//!
//! Pure functions only: the threshold table is passed in by the caller, so
//! the same reading always classifies the same way against the same table.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdTable;
use crate::error::{EngineError, EngineResult};
use crate::model::{Metric, SeverityTier};

/// Multiplier above which a breach is CRITICAL rather than HIGH.
pub const CRITICAL_FACTOR: f64 = 1.5;

/// Outcome of classifying one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub severity: SeverityTier,
}

impl Classification {
    pub fn is_alert(&self) -> bool {
        self.severity.is_alert()
    }
}

/// Severity of `value` against `threshold`.
///
/// Both comparisons are strict:
///   value <= threshold        →  NORMAL
///   value >  threshold * 1.5  →  CRITICAL
///   otherwise                 →  HIGH
///
/// The threshold is checked first, so a value at or below it is never an
/// alert even when `threshold * 1.5` is smaller than `threshold` (t < 0).
pub fn severity_for(value: f64, threshold: f64) -> SeverityTier {
    if value <= threshold {
        SeverityTier::Normal
    } else if value > threshold * CRITICAL_FACTOR {
        SeverityTier::Critical
    } else {
        SeverityTier::High
    }
}

/// Classify a raw metric name and value against the given table.
///
/// Fails with `UnknownMetric` when the name is not a metric or has no
/// configured threshold, and with `InvalidValue` on NaN or infinity.
pub fn classify(metric: &str, value: f64, thresholds: &ThresholdTable) -> EngineResult<Classification> {
    let metric: Metric = metric.parse().map_err(|_| EngineError::UnknownMetric {
        metric: metric.to_string(),
        available: thresholds.metric_names(),
    })?;
    let threshold = thresholds.threshold_for(metric)?;

    if !value.is_finite() {
        return Err(EngineError::InvalidValue(value));
    }

    Ok(Classification {
        metric,
        value,
        threshold,
        severity: severity_for(value, threshold),
    })
}
