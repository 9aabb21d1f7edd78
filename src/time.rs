//! Time specifications for historian queries
//!
//! The historian's range queries use "Inside" boundary semantics: a sample
//! whose timestamp lands exactly on `start` or `end` is part of the result.
//! `TimeRange` is therefore inclusive on both ends, unlike the half-open
//! convention common in storage engines.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A closed time interval `[start, end]` for range queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: DateTime<Utc>,
    /// End timestamp (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    ///
    /// # Panics
    /// Panics if start > end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeRange: start must not be after end");
        Self { start, end }
    }

    /// Create a time range, returning None if start > end
    pub fn try_new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Range covering the last N hours up to now
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }

    /// Range covering the last N days up to now
    pub fn last_days(days: i64) -> Self {
        Self::last_hours(days * 24)
    }

    /// Check if a timestamp falls within this range (boundaries included)
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Duration of the range
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Walk direction for count-bounded recorded queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Later samples, starting at the anchor
    Forward,
    /// Earlier samples, starting at the anchor
    Backward,
}

/// Unified time specification for recorded-value queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    /// Every recorded sample inside a closed range
    Range(TimeRange),
    /// Up to `count` recorded samples walking from an anchor
    ByCount {
        anchor: DateTime<Utc>,
        count: usize,
        direction: Direction,
    },
    /// Recorded samples at explicit timestamps, in caller order
    Instants(Vec<DateTime<Utc>>),
}
