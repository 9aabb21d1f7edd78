//! Canonical value display
//!
//! Turns a sample into a report line. Formatting is total over the value
//! variant: nothing a backend hands back can make display code fail, the
//! worst case is the explicit unknown-kind fallback string.

use chrono::{DateTime, Local, Utc};

use crate::config::DisplayConfig;
use crate::value::{Sample, Value};

/// Formats values and samples into canonical display strings
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    date_format: String,
}

impl ValueFormatter {
    /// Formatter with the configured date pattern
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            date_format: display.date_format.clone(),
        }
    }

    /// Canonical string form of one value
    ///
    /// Categoricals render their label, not the underlying code. Floats
    /// are fixed to two decimals. Timestamps use the configured pattern in
    /// local time.
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Float(v) => format!("{:.2}", v),
            Value::Integer(v) => v.to_string(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Text(s) => s.clone(),
            Value::Categorical { label, .. } => label.clone(),
            Value::Timestamp(dt) => self.format_timestamp(*dt),
            Value::Unknown(type_name) => format!("{} - Unknown type", type_name),
        }
    }

    /// Full report line for one sample
    pub fn format_sample(&self, sample: &Sample) -> String {
        format!(
            "Tag: {}, Timestamp (Local): {}, Value: {}, Quality: {}",
            sample.tag,
            self.format_timestamp(sample.timestamp),
            self.format_value(&sample.value),
            if sample.quality_good { "Good" } else { "Bad" }
        )
    }

    fn format_timestamp(&self, timestamp: DateTime<Utc>) -> String {
        timestamp
            .with_timezone(&Local)
            .format(&self.date_format)
            .to_string()
    }
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::new(&DisplayConfig::default())
    }
}
