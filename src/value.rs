//! Value variants and samples
//!
//! Historian servers hand back values as runtime-typed objects and leave
//! callers to switch on the runtime type. Here the dispatch happens once,
//! at the backend boundary: every value entering the client is folded
//! into the closed `Value` variant, and everything downstream (formatting,
//! interpolation, summaries) is total over it. `Unknown` is the single
//! escape hatch for server-side kinds the client does not model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A historian value of heterogeneous runtime kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Floating-point measurement
    Float(f64),
    /// Integer measurement (counters, raw digital codes)
    Integer(i64),
    /// Boolean state
    Boolean(bool),
    /// Free-form string
    Text(String),
    /// Enumerated state: underlying code plus its display label
    Categorical { code: i32, label: String },
    /// Timestamp-valued tag
    Timestamp(DateTime<Utc>),
    /// Server value kind the client does not model; carries the runtime
    /// type name for display
    Unknown(String),
}

impl Value {
    /// Numeric view of the value, if it has one
    ///
    /// Floats and integers convert directly; booleans map to 0/1 and
    /// categoricals to their code, matching how the historian itself
    /// treats digital states in calculations.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Categorical { code, .. } => Some(*code as f64),
            _ => None,
        }
    }

    /// Whether the value kind interpolates linearly between recorded
    /// samples; all other kinds are stepped (hold previous value)
    pub fn is_continuous(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

/// One recorded or synthesized sample
///
/// Immutable once produced by the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Name of the tag this sample belongs to
    pub tag: String,
    /// Sample timestamp (UTC; converted to local time only for display)
    pub timestamp: DateTime<Utc>,
    /// The value
    pub value: Value,
    /// Quality flag as reported by the historian
    pub quality_good: bool,
}

impl Sample {
    /// Create a good-quality sample
    pub fn new(tag: impl Into<String>, timestamp: DateTime<Utc>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            timestamp,
            value,
            quality_good: true,
        }
    }

    /// Builder method: mark the sample bad quality
    pub fn bad_quality(mut self) -> Self {
        self.quality_good = false;
        self
    }
}
