//! Query engine
//!
//! The four typed query primitives over a resolved tag handle: recorded
//! (raw) reads, fixed-step interpolation, interpolation at explicit
//! times, and periodic summaries, plus the multi-tag interpolated
//! variant.
//!
//! Raw reads pass straight through to the backend. Interpolation and
//! summaries fetch the recorded series (extended by one bracketing sample
//! on each side of the window) and synthesize results client-side.
//!
//! Failure policy: a stale tag handle short-circuits before the backend
//! is contacted; in-flight backend failures propagate unchanged as
//! transport errors; nothing retries.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::backend::FilterExpr;
use crate::connection::{query_error, Connection};
use crate::error::{ClientError, ClientResult};
use crate::query::interpolate::interpolate_at;
use crate::query::summary::{summarize, SummarySpec};
use crate::tags::TagHandle;
use crate::time::{Direction, TimeRange, TimeSpec};
use crate::value::Sample;

/// Issues queries against resolved tag handles
pub struct QueryEngine<'a> {
    conn: &'a mut Connection,
}

impl<'a> QueryEngine<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Recorded samples with timestamp inside `[start, end]` (boundaries
    /// included), in chronological order
    pub fn raw_range(&mut self, tag: &TagHandle, range: TimeRange) -> ClientResult<Vec<Sample>> {
        self.prepare(tag)?;
        let server = self.conn.server_session()?;
        self.conn
            .backend()
            .recorded_range(&server, tag.point(), range, None)
            .map_err(query_error)
    }

    /// Up to `count` recorded samples walking from `anchor`
    ///
    /// Fewer than `count` results mean the tag's history is exhausted;
    /// under-supply is never an error.
    pub fn raw_by_count(
        &mut self,
        tag: &TagHandle,
        anchor: DateTime<Utc>,
        count: usize,
        direction: Direction,
    ) -> ClientResult<Vec<Sample>> {
        self.prepare(tag)?;
        let server = self.conn.server_session()?;
        self.conn
            .backend()
            .recorded_by_count(&server, tag.point(), anchor, count, direction, None)
            .map_err(query_error)
    }

    /// Recorded samples for a unified time specification
    ///
    /// `Instants` looks up exact recorded timestamps, in caller order;
    /// instants with no recorded sample are skipped.
    pub fn recorded(&mut self, tag: &TagHandle, spec: &TimeSpec) -> ClientResult<Vec<Sample>> {
        match spec {
            TimeSpec::Range(range) => self.raw_range(tag, *range),
            TimeSpec::ByCount {
                anchor,
                count,
                direction,
            } => self.raw_by_count(tag, *anchor, *count, *direction),
            TimeSpec::Instants(times) => {
                self.prepare(tag)?;
                let server = self.conn.server_session()?;
                let mut samples = Vec::new();
                for at in times {
                    if let Some(sample) = self
                        .conn
                        .backend()
                        .recorded_at(&server, tag.point(), *at)
                        .map_err(query_error)?
                    {
                        samples.push(sample);
                    }
                }
                Ok(samples)
            }
        }
    }

    /// Fixed-step interpolation over a range
    ///
    /// Returns exactly `floor((end - start) / interval) + 1` samples at
    /// `start + k * interval`.
    pub fn interpolated(
        &mut self,
        tag: &TagHandle,
        range: TimeRange,
        interval: Duration,
    ) -> ClientResult<Vec<Sample>> {
        self.interpolated_filtered(tag, range, interval, None)
    }

    /// One interpolated sample per input timestamp, in input order
    ///
    /// Input order is caller-significant and need not be chronological;
    /// the result length always equals the input length.
    pub fn interpolated_at_times(
        &mut self,
        tag: &TagHandle,
        times: &[DateTime<Utc>],
    ) -> ClientResult<Vec<Sample>> {
        if times.is_empty() {
            return Ok(Vec::new());
        }
        self.prepare(tag)?;

        let earliest = *times.iter().min().expect("non-empty");
        let latest = *times.iter().max().expect("non-empty");
        let series = self.fetch_with_brackets(tag, earliest, latest, None)?;

        Ok(times
            .iter()
            .map(|at| interpolate_at(tag.name(), &series, *at))
            .collect())
    }

    /// Periodic summary over consecutive buckets
    pub fn summary(
        &mut self,
        tag: &TagHandle,
        range: TimeRange,
        spec: &SummarySpec,
    ) -> ClientResult<Vec<Sample>> {
        self.prepare(tag)?;
        let series = self.fetch_with_brackets(tag, range.start, range.end, None)?;
        summarize(tag.name(), &series, range, spec)
    }

    /// Fixed-step interpolation for several tags at once
    ///
    /// Each tag is queried independently and keeps its own result
    /// sequence in the returned map; callers flatten if they want a
    /// single stream. The optional filter is evaluated server-side on the
    /// recorded values before interpolation.
    pub fn interpolated_multi(
        &mut self,
        tags: &[TagHandle],
        range: TimeRange,
        interval: Duration,
        filter: Option<&FilterExpr>,
    ) -> ClientResult<BTreeMap<String, Vec<Sample>>> {
        let mut results = BTreeMap::new();
        for tag in tags {
            let samples = self.interpolated_filtered(tag, range, interval, filter)?;
            results.insert(tag.name().to_string(), samples);
        }
        Ok(results)
    }

    fn interpolated_filtered(
        &mut self,
        tag: &TagHandle,
        range: TimeRange,
        interval: Duration,
        filter: Option<&FilterExpr>,
    ) -> ClientResult<Vec<Sample>> {
        // Millisecond resolution; anything finer divides the step count
        // to zero
        if interval.num_milliseconds() <= 0 {
            return Err(ClientError::InvalidInterval);
        }
        self.prepare(tag)?;
        let series = self.fetch_with_brackets(tag, range.start, range.end, filter)?;

        let steps = range.duration().num_milliseconds() / interval.num_milliseconds();
        let mut samples = Vec::with_capacity(steps as usize + 1);
        for k in 0..=steps {
            let at = step_timestamp(range.start, interval, k);
            samples.push(interpolate_at(tag.name(), &series, at));
        }
        Ok(samples)
    }

    /// Recorded series over `[start, end]` extended with the nearest
    /// recorded sample on each side, for bracketing at the window edges
    fn fetch_with_brackets(
        &mut self,
        tag: &TagHandle,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: Option<&FilterExpr>,
    ) -> ClientResult<Vec<Sample>> {
        let server = self.conn.server_session()?;
        let backend = self.conn.backend();
        let point = tag.point();

        let mut series = backend
            .recorded_range(&server, point, TimeRange::new(start, end), filter)
            .map_err(query_error)?;

        // The by-count walks include a sample sitting exactly on the
        // anchor, which the range fetch already returned; dedupe by
        // timestamp. The filter is pushed down, so the walk skips past
        // excluded samples to the nearest surviving one.
        let before = backend
            .recorded_by_count(&server, point, start, 1, Direction::Backward, filter)
            .map_err(query_error)?;
        for sample in before {
            if series.first().map_or(true, |f| sample.timestamp < f.timestamp) {
                series.insert(0, sample);
            }
        }

        let after = backend
            .recorded_by_count(&server, point, end, 1, Direction::Forward, filter)
            .map_err(query_error)?;
        for sample in after {
            if series.last().map_or(true, |l| sample.timestamp > l.timestamp) {
                series.push(sample);
            }
        }

        Ok(series)
    }

    /// Handle validity first, then lazy connect
    fn prepare(&mut self, tag: &TagHandle) -> ClientResult<()> {
        self.conn.check_handle(tag)?;
        self.conn.ensure_connected()
    }
}

/// Timestamp of step `k`, computed in i64 milliseconds so step counts
/// past `i32::MAX` do not truncate
fn step_timestamp(start: DateTime<Utc>, interval: Duration, k: i64) -> DateTime<Utc> {
    start + Duration::milliseconds(interval.num_milliseconds() * k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompareOp, MemoryHistorian};
    use crate::config::Config;
    use crate::query::summary::{CalculationBasis, SummaryKind};
    use crate::tags::TagResolver;
    use crate::value::Value;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Backend with a float tag recorded every 100s from t=0 to t=1000
    /// (value = t/100) and a mode tag flipping AUTO → MANUAL at t=500
    fn demo_backend() -> MemoryHistorian {
        let mut backend = MemoryHistorian::new("SRV01", "PlantDB");
        backend.add_tag("BC.X.PV", "scan1");
        for i in 0..=10 {
            backend.record("BC.X.PV", at(i * 100), Value::Float(i as f64));
        }
        backend.add_tag("BC.HCLCONV.FIC1420.MODE", "scan1");
        backend.record(
            "BC.HCLCONV.FIC1420.MODE",
            at(0),
            Value::Categorical {
                code: 0,
                label: "AUTO".to_string(),
            },
        );
        backend.record(
            "BC.HCLCONV.FIC1420.MODE",
            at(500),
            Value::Categorical {
                code: 1,
                label: "MANUAL".to_string(),
            },
        );
        backend
    }

    fn demo_connection(backend: MemoryHistorian) -> Connection {
        let mut config = Config::default();
        config.historian.server_name = "SRV01".to_string();
        config.historian.database_name = "PlantDB".to_string();
        Connection::new(config, backend)
    }

    fn resolve(conn: &mut Connection, name: &str) -> TagHandle {
        TagResolver::new(conn).resolve(name).unwrap()
    }

    #[test]
    fn test_raw_range_in_bounds_and_ordered() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        let range = TimeRange::new(at(150), at(750));
        let samples = QueryEngine::new(&mut conn).raw_range(&tag, range).unwrap();

        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| range.contains(s.timestamp)));
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_raw_by_count_forward_bounds() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");
        let mut engine = QueryEngine::new(&mut conn);

        let samples = engine
            .raw_by_count(&tag, at(250), 3, Direction::Forward)
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.timestamp >= at(250)));

        // History exhausts before count is reached
        let samples = engine
            .raw_by_count(&tag, at(900), 30, Direction::Forward)
            .unwrap();
        assert_eq!(samples.len(), 2); // t=900, t=1000
    }

    #[test]
    fn test_recorded_instants_in_caller_order() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        // Unsorted instants; t=450 has no recorded sample and is skipped
        let spec = TimeSpec::Instants(vec![at(700), at(450), at(200)]);
        let samples = QueryEngine::new(&mut conn).recorded(&tag, &spec).unwrap();

        let stamps: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![at(700), at(200)]);
    }

    #[test]
    fn test_interpolated_sample_count_and_spacing() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        // 1000s window, 150s steps: floor(1000/150) + 1 = 7 samples
        let range = TimeRange::new(at(0), at(1000));
        let samples = QueryEngine::new(&mut conn)
            .interpolated(&tag, range, Duration::seconds(150))
            .unwrap();

        assert_eq!(samples.len(), 7);
        for (k, sample) in samples.iter().enumerate() {
            assert_eq!(sample.timestamp, at(k as i64 * 150));
        }
        // Value is t/100, so at t=150 interpolation gives 1.5
        assert_eq!(samples[1].value, Value::Float(1.5));
    }

    #[test]
    fn test_interpolated_rejects_bad_interval() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        let range = TimeRange::new(at(0), at(1000));
        let err = QueryEngine::new(&mut conn)
            .interpolated(&tag, range, Duration::zero())
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInterval));
    }

    #[test]
    fn test_interpolated_rejects_submillisecond_interval() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        // Positive but below millisecond resolution; must error, not
        // divide the step count by zero
        let range = TimeRange::new(at(0), at(1000));
        let err = QueryEngine::new(&mut conn)
            .interpolated(&tag, range, Duration::microseconds(500))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInterval));
    }

    #[test]
    fn test_step_timestamps_survive_large_step_counts() {
        let start = at(0);
        let k = i32::MAX as i64 + 1;

        let ts = step_timestamp(start, Duration::milliseconds(1), k);
        assert_eq!(ts, start + Duration::milliseconds(k));
    }

    #[test]
    fn test_interpolated_at_times_preserves_input_order() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        let times = vec![at(950), at(50), at(450)];
        let samples = QueryEngine::new(&mut conn)
            .interpolated_at_times(&tag, &times)
            .unwrap();

        assert_eq!(samples.len(), times.len());
        for (sample, t) in samples.iter().zip(&times) {
            assert_eq!(sample.timestamp, *t);
        }
        assert_eq!(samples[1].value, Value::Float(0.5));
    }

    #[test]
    fn test_interpolated_stepped_mode_tag() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.HCLCONV.FIC1420.MODE");

        let samples = QueryEngine::new(&mut conn)
            .interpolated_at_times(&tag, &[at(499), at(500), at(800)])
            .unwrap();

        let labels: Vec<_> = samples
            .iter()
            .map(|s| match &s.value {
                Value::Categorical { label, .. } => label.as_str(),
                other => panic!("unexpected value: {:?}", other),
            })
            .collect();
        assert_eq!(labels, vec!["AUTO", "MANUAL", "MANUAL"]);
    }

    #[test]
    fn test_summary_hourly_average() {
        let mut backend = MemoryHistorian::new("SRV01", "PlantDB");
        backend.add_tag("T", "scan1");
        // 4.0 for the first half hour, 8.0 for the second
        backend.record("T", at(0), Value::Float(4.0));
        backend.record("T", at(1800), Value::Float(8.0));
        let mut conn = demo_connection(backend);
        let tag = resolve(&mut conn, "T");

        let range = TimeRange::new(at(0), at(3600));
        let samples = QueryEngine::new(&mut conn)
            .summary(&tag, range, &SummarySpec::hourly_average())
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, at(0));
        assert!((samples[0].value.as_f64().unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_event_weighted_max() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        let range = TimeRange::new(at(0), at(1000));
        let spec = SummarySpec::new(Duration::seconds(500), SummaryKind::Maximum)
            .basis(CalculationBasis::EventWeighted);
        let samples = QueryEngine::new(&mut conn).summary(&tag, range, &spec).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value.as_f64(), Some(4.0)); // t=400
        assert_eq!(samples[1].value.as_f64(), Some(10.0)); // t=1000, last bucket owns its end
    }

    #[test]
    fn test_multi_tag_keeps_per_tag_results() {
        let mut conn = demo_connection(demo_backend());
        let pv = resolve(&mut conn, "BC.X.PV");
        let mode = resolve(&mut conn, "BC.HCLCONV.FIC1420.MODE");

        let range = TimeRange::new(at(0), at(1000));
        let results = QueryEngine::new(&mut conn)
            .interpolated_multi(&[pv, mode], range, Duration::seconds(500), None)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["BC.X.PV"].len(), 3);
        assert_eq!(results["BC.HCLCONV.FIC1420.MODE"].len(), 3);
        assert!(results["BC.X.PV"]
            .iter()
            .all(|s| s.tag == "BC.X.PV"));
    }

    #[test]
    fn test_multi_tag_filter_excludes_values_before_interpolation() {
        let mut backend = MemoryHistorian::new("SRV01", "PlantDB");
        backend.add_tag("T", "scan1");
        backend.record("T", at(0), Value::Float(10.0));
        backend.record("T", at(100), Value::Float(-5.0)); // filtered out
        backend.record("T", at(200), Value::Float(20.0));
        let mut conn = demo_connection(backend);
        let tag = resolve(&mut conn, "T");

        let filter = FilterExpr::exclude(CompareOp::Lt, 0.0);
        let range = TimeRange::new(at(0), at(200));
        let results = QueryEngine::new(&mut conn)
            .interpolated_multi(&[tag], range, Duration::seconds(100), Some(&filter))
            .unwrap();

        // With the negative sample dropped, t=100 interpolates between
        // its surviving neighbours instead of hitting -5.0
        assert_eq!(results["T"][1].value, Value::Float(15.0));
    }

    #[test]
    fn test_filter_excluded_bracket_walks_to_surviving_sample() {
        let mut backend = MemoryHistorian::new("SRV01", "PlantDB");
        backend.add_tag("T", "scan1");
        backend.record("T", at(0), Value::Float(10.0));
        backend.record("T", at(90), Value::Float(-5.0)); // excluded by the filter
        backend.record("T", at(200), Value::Float(20.0));
        let mut conn = demo_connection(backend);
        let tag = resolve(&mut conn, "T");

        let filter = FilterExpr::exclude(CompareOp::Lt, 0.0);
        let range = TimeRange::new(at(100), at(200));
        let results = QueryEngine::new(&mut conn)
            .interpolated_multi(&[tag], range, Duration::seconds(100), Some(&filter))
            .unwrap();

        // The nearest sample before the window (t=90) is excluded; the
        // bracket walk continues to t=0, so the window start interpolates
        // between surviving samples at good quality
        let sample = &results["T"][0];
        assert_eq!(sample.value, Value::Float(15.0));
        assert!(sample.quality_good);
    }

    #[test]
    fn test_stale_handle_short_circuits() {
        let mut conn = demo_connection(demo_backend());
        let tag = resolve(&mut conn, "BC.X.PV");

        conn.disconnect();
        // Backend would fail loudly if contacted; the handle check fires first
        let err = QueryEngine::new(&mut conn)
            .raw_range(&tag, TimeRange::new(at(0), at(1000)))
            .unwrap_err();
        assert!(matches!(err, ClientError::StaleHandle(_)));
    }

    #[test]
    fn test_transport_failure_propagates_and_leaves_connection_usable() {
        use std::sync::atomic::Ordering;

        let backend = demo_backend();
        let failing = backend.failure_flag();
        let mut conn = demo_connection(backend);
        let tag = resolve(&mut conn, "BC.X.PV");
        let range = TimeRange::new(at(0), at(1000));

        failing.store(true, Ordering::SeqCst);
        let err = QueryEngine::new(&mut conn).raw_range(&tag, range).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        // Connection state is left as-is; retrying after the fault clears
        // needs no reconnect
        assert!(conn.is_connected());
        failing.store(false, Ordering::SeqCst);
        let samples = QueryEngine::new(&mut conn).raw_range(&tag, range).unwrap();
        assert_eq!(samples.len(), 11);
    }
}
