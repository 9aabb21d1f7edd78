//! Interpolation between recorded samples
//!
//! A synthetic sample at time `t` is computed from the two recorded
//! samples bracketing `t`. Continuous kinds (floats) interpolate linearly;
//! every other kind is stepped and holds the previous recorded value.
//! Quality propagates: a synthetic value built from a bad-quality bracket
//! is itself bad.
//!
//! Edge policy at the ends of recorded history:
//! - only a left bracket: hold its value (stepped extrapolation)
//! - only a right bracket (before the first recorded sample): that value,
//!   flagged bad quality
//! - no recorded history at all: `Unknown("No Data")`, bad quality

use chrono::{DateTime, Utc};

use crate::value::{Sample, Value};

/// Interpolate one sample at `at` from a chronologically sorted series
pub(crate) fn interpolate_at(tag: &str, series: &[Sample], at: DateTime<Utc>) -> Sample {
    let idx = series.partition_point(|s| s.timestamp < at);

    // Exact hit on a recorded sample: return it verbatim
    if let Some(hit) = series.get(idx).filter(|s| s.timestamp == at) {
        return hit.clone();
    }

    let left = idx.checked_sub(1).map(|i| &series[i]);
    let right = series.get(idx);

    match (left, right) {
        (Some(l), Some(r)) => {
            if l.value.is_continuous() {
                if let (Some(v0), Some(v1)) = (l.value.as_f64(), r.value.as_f64()) {
                    let span = (r.timestamp - l.timestamp).num_milliseconds() as f64;
                    let frac = (at - l.timestamp).num_milliseconds() as f64 / span;
                    return Sample {
                        tag: tag.to_string(),
                        timestamp: at,
                        value: Value::Float(v0 + (v1 - v0) * frac),
                        quality_good: l.quality_good && r.quality_good,
                    };
                }
            }
            // Stepped kinds hold the previous recorded value
            Sample {
                tag: tag.to_string(),
                timestamp: at,
                value: l.value.clone(),
                quality_good: l.quality_good,
            }
        }
        (Some(l), None) => Sample {
            tag: tag.to_string(),
            timestamp: at,
            value: l.value.clone(),
            quality_good: l.quality_good,
        },
        (None, Some(r)) => Sample {
            tag: tag.to_string(),
            timestamp: at,
            value: r.value.clone(),
            quality_good: false,
        },
        (None, None) => Sample {
            tag: tag.to_string(),
            timestamp: at,
            value: Value::Unknown("No Data".to_string()),
            quality_good: false,
        },
    }
}
