//! Periodic summary aggregation
//!
//! Partitions a query range into consecutive non-overlapping buckets and
//! computes one aggregate per bucket. Two calculation bases:
//!
//! - **Time-weighted**: each value is weighted by how long it held
//!   (stepped), including the value carried into the bucket from before
//!   its start. Intervals held by bad-quality samples are excluded from
//!   both the integral and the covered duration.
//! - **Event-weighted**: every recorded event inside the bucket counts
//!   equally, regardless of spacing. Bad-quality events are excluded.
//!
//! `Count` always counts good recorded events in the bucket; weighting a
//! count by time has no sensible meaning.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ClientError, ClientResult};
use crate::time::TimeRange;
use crate::value::{Sample, Value};

/// Aggregate computed per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Average,
    Sum,
    Minimum,
    Maximum,
    Count,
}

/// How values are weighted within a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationBasis {
    /// Integrate each value over the interval it held
    TimeWeighted,
    /// Treat each recorded event equally
    EventWeighted,
}

/// Which timestamp represents a bucket's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPolicy {
    BucketStart,
    BucketEnd,
    /// Timestamp of the contributing extreme value; only meaningful for
    /// `Minimum`/`Maximum`, falls back to the bucket start otherwise
    TimeOfExtreme,
}

/// Full specification of a periodic summary query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummarySpec {
    pub bucket_duration: Duration,
    pub kind: SummaryKind,
    pub basis: CalculationBasis,
    pub timestamp_policy: TimestampPolicy,
}

impl SummarySpec {
    /// Summary with time-weighted basis and bucket-start timestamps
    pub fn new(bucket_duration: Duration, kind: SummaryKind) -> Self {
        Self {
            bucket_duration,
            kind,
            basis: CalculationBasis::TimeWeighted,
            timestamp_policy: TimestampPolicy::BucketStart,
        }
    }

    /// The classic report: time-weighted hourly average, stamped at the
    /// bucket start
    pub fn hourly_average() -> Self {
        Self::new(Duration::hours(1), SummaryKind::Average)
    }

    /// Builder method: set the calculation basis
    pub fn basis(mut self, basis: CalculationBasis) -> Self {
        self.basis = basis;
        self
    }

    /// Builder method: set the timestamp policy
    pub fn timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamp_policy = policy;
        self
    }
}

/// Summarize a chronologically sorted series over a range
///
/// `series` must include any recorded sample preceding `range.start` that
/// should carry its value into the first bucket (the engine fetches it).
pub(crate) fn summarize(
    tag: &str,
    series: &[Sample],
    range: TimeRange,
    spec: &SummarySpec,
) -> ClientResult<Vec<Sample>> {
    // Millisecond resolution, same floor as interpolation intervals
    if spec.bucket_duration.num_milliseconds() <= 0 {
        return Err(ClientError::InvalidInterval);
    }

    let mut out = Vec::new();
    let mut bucket_start = range.start;
    while bucket_start < range.end {
        let mut bucket_end = bucket_start + spec.bucket_duration;
        if bucket_end > range.end {
            bucket_end = range.end;
        }
        let is_last = bucket_end == range.end;
        out.push(summarize_bucket(
            tag,
            series,
            bucket_start,
            bucket_end,
            is_last,
            spec,
        ));
        bucket_start = bucket_end;
    }
    Ok(out)
}

/// A good-quality numeric contribution to a bucket
struct Contribution {
    value: f64,
    timestamp: DateTime<Utc>,
}

fn summarize_bucket(
    tag: &str,
    series: &[Sample],
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
    is_last: bool,
    spec: &SummarySpec,
) -> Sample {
    // Events belonging to this bucket: [start, end), the final bucket
    // also owns its end boundary
    let in_bucket = |ts: DateTime<Utc>| {
        ts >= bucket_start && (ts < bucket_end || (is_last && ts == bucket_end))
    };
    let events: Vec<&Sample> = series.iter().filter(|s| in_bucket(s.timestamp)).collect();

    if spec.kind == SummaryKind::Count {
        let count = events.iter().filter(|s| s.quality_good).count();
        return finish(tag, Value::Integer(count as i64), None, bucket_start, bucket_end, spec);
    }

    let (aggregate, extreme_ts) = match spec.basis {
        CalculationBasis::EventWeighted => event_weighted(&events, spec.kind),
        CalculationBasis::TimeWeighted => {
            time_weighted(series, bucket_start, bucket_end, spec.kind)
        }
    };

    match aggregate {
        Some(value) => finish(tag, Value::Float(value), extreme_ts, bucket_start, bucket_end, spec),
        None => {
            let timestamp = representative_timestamp(spec, bucket_start, bucket_end, None);
            Sample {
                tag: tag.to_string(),
                timestamp,
                value: Value::Unknown("No Data".to_string()),
                quality_good: false,
            }
        }
    }
}

fn event_weighted(
    events: &[&Sample],
    kind: SummaryKind,
) -> (Option<f64>, Option<DateTime<Utc>>) {
    let values: Vec<Contribution> = events
        .iter()
        .filter(|s| s.quality_good)
        .filter_map(|s| {
            s.value.as_f64().map(|value| Contribution {
                value,
                timestamp: s.timestamp,
            })
        })
        .collect();

    if values.is_empty() {
        return (None, None);
    }

    match kind {
        SummaryKind::Average => {
            let sum: f64 = values.iter().map(|c| c.value).sum();
            (Some(sum / values.len() as f64), None)
        }
        SummaryKind::Sum => (Some(values.iter().map(|c| c.value).sum()), None),
        SummaryKind::Minimum => pick_extreme(&values, |a, b| a < b),
        SummaryKind::Maximum => pick_extreme(&values, |a, b| a > b),
        SummaryKind::Count => unreachable!("Count handled before basis dispatch"),
    }
}

/// Stepped integral over the bucket: each sample's value holds from its
/// timestamp until the next sample, clipped to the bucket
fn time_weighted(
    series: &[Sample],
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
    kind: SummaryKind,
) -> (Option<f64>, Option<DateTime<Utc>>) {
    // The value in effect at the bucket start, carried from before
    let boundary_idx = series.partition_point(|s| s.timestamp <= bucket_start);
    let mut current: Option<&Sample> = boundary_idx.checked_sub(1).map(|i| &series[i]);
    let mut segment_start = bucket_start;

    let mut integral_ms = 0.0;
    let mut covered_ms = 0.0;
    let mut contributions: Vec<Contribution> = Vec::new();

    if let Some(cur) = current {
        if cur.quality_good {
            if let Some(value) = cur.value.as_f64() {
                contributions.push(Contribution {
                    value,
                    timestamp: bucket_start,
                });
            }
        }
    }

    let inside = series
        .iter()
        .filter(|s| s.timestamp > bucket_start && s.timestamp < bucket_end);
    for sample in inside {
        accumulate_segment(current, segment_start, sample.timestamp, &mut integral_ms, &mut covered_ms);
        if sample.quality_good {
            if let Some(value) = sample.value.as_f64() {
                contributions.push(Contribution {
                    value,
                    timestamp: sample.timestamp,
                });
            }
        }
        current = Some(sample);
        segment_start = sample.timestamp;
    }
    accumulate_segment(current, segment_start, bucket_end, &mut integral_ms, &mut covered_ms);

    match kind {
        SummaryKind::Average => {
            if covered_ms > 0.0 {
                (Some(integral_ms / covered_ms), None)
            } else {
                (None, None)
            }
        }
        // Time-weighted sum is the integral in value-seconds
        SummaryKind::Sum => {
            if covered_ms > 0.0 {
                (Some(integral_ms / 1000.0), None)
            } else {
                (None, None)
            }
        }
        SummaryKind::Minimum => pick_extreme(&contributions, |a, b| a < b),
        SummaryKind::Maximum => pick_extreme(&contributions, |a, b| a > b),
        SummaryKind::Count => unreachable!("Count handled before basis dispatch"),
    }
}

fn accumulate_segment(
    current: Option<&Sample>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    integral_ms: &mut f64,
    covered_ms: &mut f64,
) {
    let Some(sample) = current else { return };
    if !sample.quality_good {
        return;
    }
    let Some(value) = sample.value.as_f64() else {
        return;
    };
    let span = (to - from).num_milliseconds() as f64;
    if span > 0.0 {
        *integral_ms += value * span;
        *covered_ms += span;
    }
}

fn pick_extreme(
    values: &[Contribution],
    better: fn(f64, f64) -> bool,
) -> (Option<f64>, Option<DateTime<Utc>>) {
    let mut best: Option<&Contribution> = None;
    for c in values {
        match best {
            Some(b) if !better(c.value, b.value) => {}
            _ => best = Some(c),
        }
    }
    match best {
        Some(b) => (Some(b.value), Some(b.timestamp)),
        None => (None, None),
    }
}

fn finish(
    tag: &str,
    value: Value,
    extreme_ts: Option<DateTime<Utc>>,
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
    spec: &SummarySpec,
) -> Sample {
    Sample {
        tag: tag.to_string(),
        timestamp: representative_timestamp(spec, bucket_start, bucket_end, extreme_ts),
        value,
        quality_good: true,
    }
}

fn representative_timestamp(
    spec: &SummarySpec,
    bucket_start: DateTime<Utc>,
    bucket_end: DateTime<Utc>,
    extreme_ts: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    match spec.timestamp_policy {
        TimestampPolicy::BucketStart => bucket_start,
        TimestampPolicy::BucketEnd => bucket_end,
        TimestampPolicy::TimeOfExtreme => extreme_ts.unwrap_or(bucket_start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn value_of(sample: &Sample) -> f64 {
        sample.value.as_f64().expect("numeric summary value")
    }

    #[test]
    fn test_bucket_partitioning() {
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::minutes(15), SummaryKind::Count);
        let buckets = summarize("T", &[], range, &spec).unwrap();
        assert_eq!(buckets.len(), 4);
    }

    #[test]
    fn test_partial_final_bucket() {
        let range = TimeRange::new(at(0), at(5400)); // 1.5h
        let spec = SummarySpec::hourly_average();
        let buckets = summarize("T", &[], range, &spec).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].timestamp, at(0));
        assert_eq!(buckets[1].timestamp, at(3600));
    }

    #[test]
    fn test_zero_bucket_duration_rejected() {
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::zero(), SummaryKind::Average);
        assert!(matches!(
            summarize("T", &[], range, &spec),
            Err(ClientError::InvalidInterval)
        ));
    }

    #[test]
    fn test_submillisecond_bucket_duration_rejected() {
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::microseconds(500), SummaryKind::Average);
        assert!(matches!(
            summarize("T", &[], range, &spec),
            Err(ClientError::InvalidInterval)
        ));
    }

    #[test]
    fn test_event_weighted_average_ignores_spacing() {
        // Three events bunched at the start of the bucket
        let series = vec![
            Sample::new("T", at(0), Value::Float(1.0)),
            Sample::new("T", at(1), Value::Float(2.0)),
            Sample::new("T", at(2), Value::Float(6.0)),
        ];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::hours(1), SummaryKind::Average)
            .basis(CalculationBasis::EventWeighted);

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert_eq!(buckets.len(), 1);
        assert!((value_of(&buckets[0]) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_weighted_average_weights_by_duration() {
        // 10.0 holds for 900s, then 20.0 for the remaining 2700s
        let series = vec![
            Sample::new("T", at(0), Value::Float(10.0)),
            Sample::new("T", at(900), Value::Float(20.0)),
        ];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::hourly_average();

        let buckets = summarize("T", &series, range, &spec).unwrap();
        let expected = (10.0 * 900.0 + 20.0 * 2700.0) / 3600.0;
        assert!((value_of(&buckets[0]) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_time_weighted_uses_boundary_value() {
        // The only recorded sample precedes the bucket; its value carries in
        let series = vec![Sample::new("T", at(-500), Value::Float(7.0))];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::hourly_average();

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert!((value_of(&buckets[0]) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_quality_interval_excluded() {
        // Bad sample holds the middle third of the bucket
        let series = vec![
            Sample::new("T", at(0), Value::Float(10.0)),
            Sample::new("T", at(1200), Value::Float(99.0)).bad_quality(),
            Sample::new("T", at(2400), Value::Float(10.0)),
        ];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::hourly_average();

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert!((value_of(&buckets[0]) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_bucket_is_bad_quality_no_data() {
        let series = vec![Sample::new("T", at(100), Value::Float(1.0))];
        let range = TimeRange::new(at(0), at(7200));
        let spec = SummarySpec::hourly_average();

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert!(buckets[0].quality_good);
        // Second hour has no events and no carried value change, but the
        // stepped value still holds: it is not empty
        assert!(buckets[1].quality_good);

        // A range entirely before any data is empty
        let early = TimeRange::new(at(-7200), at(-3600));
        let buckets = summarize("T", &series, early, &spec).unwrap();
        assert!(!buckets[0].quality_good);
        assert_eq!(buckets[0].value, Value::Unknown("No Data".to_string()));
    }

    #[test]
    fn test_minimum_with_time_of_extreme() {
        let series = vec![
            Sample::new("T", at(100), Value::Float(5.0)),
            Sample::new("T", at(200), Value::Float(1.0)),
            Sample::new("T", at(300), Value::Float(9.0)),
        ];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::hours(1), SummaryKind::Minimum)
            .basis(CalculationBasis::EventWeighted)
            .timestamp_policy(TimestampPolicy::TimeOfExtreme);

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert_eq!(value_of(&buckets[0]), 1.0);
        assert_eq!(buckets[0].timestamp, at(200));
    }

    #[test]
    fn test_count_counts_good_events() {
        let series = vec![
            Sample::new("T", at(100), Value::Float(1.0)),
            Sample::new("T", at(200), Value::Float(2.0)).bad_quality(),
            Sample::new("T", at(300), Value::Float(3.0)),
        ];
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::hours(1), SummaryKind::Count);

        let buckets = summarize("T", &series, range, &spec).unwrap();
        assert_eq!(buckets[0].value, Value::Integer(2));
    }

    #[test]
    fn test_bucket_end_timestamp_policy() {
        let range = TimeRange::new(at(0), at(3600));
        let spec = SummarySpec::new(Duration::hours(1), SummaryKind::Count)
            .timestamp_policy(TimestampPolicy::BucketEnd);

        let buckets = summarize("T", &[], range, &spec).unwrap();
        assert_eq!(buckets[0].timestamp, at(3600));
    }
}
