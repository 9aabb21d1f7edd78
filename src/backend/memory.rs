//! In-memory historian backend
//!
//! Stands in for a real transport in tests and the demo binary. Holds a
//! single server with one or more databases, a tag table with ordered
//! sample stores, and a unit-of-measure table. The `online` toggle
//! simulates a dead server for liveness tests; `set_failing` makes every
//! in-flight query fail with a transport error.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::{
    Backend, BackendError, DatabaseHandle, FilterExpr, PointId, ServerSession, SystemSession,
    TagRecord,
};
use crate::config::Credential;
use crate::tags::wildcard_match;
use crate::time::{Direction, TimeRange};
use crate::uom::UnitOfMeasure;
use crate::value::{Sample, Value};

struct TagData {
    id: PointId,
    source: String,
    /// Samples ordered by timestamp; the bool is the quality flag
    samples: BTreeMap<DateTime<Utc>, (Value, bool)>,
}

/// In-memory historian for tests and demos
pub struct MemoryHistorian {
    server_name: String,
    databases: Vec<String>,
    tags: BTreeMap<String, TagData>,
    units: Vec<UnitOfMeasure>,
    next_point_id: u64,
    next_session_id: u64,
    server_session: Option<u64>,
    system_session: Option<u64>,
    /// Shared so tests can flip liveness after the connection has taken
    /// ownership of the backend
    online: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl MemoryHistorian {
    /// Create a historian with one server and one database
    pub fn new(server_name: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            databases: vec![database_name.into()],
            tags: BTreeMap::new(),
            units: Vec::new(),
            next_point_id: 1,
            next_session_id: 1,
            server_session: None,
            system_session: None,
            online: Arc::new(AtomicBool::new(true)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a tag with its originating subsystem
    pub fn add_tag(&mut self, name: impl Into<String>, source: impl Into<String>) -> PointId {
        let id = PointId(self.next_point_id);
        self.next_point_id += 1;
        self.tags.insert(
            name.into(),
            TagData {
                id,
                source: source.into(),
                samples: BTreeMap::new(),
            },
        );
        id
    }

    /// Record a good-quality sample for a tag
    ///
    /// # Panics
    /// Panics if the tag was never added; test fixtures register tags
    /// before recording into them.
    pub fn record(&mut self, tag: &str, timestamp: DateTime<Utc>, value: Value) {
        self.record_with_quality(tag, timestamp, value, true);
    }

    /// Record a sample with an explicit quality flag
    pub fn record_with_quality(
        &mut self,
        tag: &str,
        timestamp: DateTime<Utc>,
        value: Value,
        good: bool,
    ) {
        let data = self.tags.get_mut(tag).expect("unknown tag in fixture");
        data.samples.insert(timestamp, (value, good));
    }

    /// Register a unit of measure
    pub fn add_unit(&mut self, unit: UnitOfMeasure) {
        self.units.push(unit);
    }

    /// Simulate the server going down (or coming back)
    pub fn set_online(&mut self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make every subsequent query fail with a transport error
    pub fn set_failing(&mut self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Handle to the liveness toggle, usable after the backend is boxed
    pub fn online_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.online)
    }

    /// Handle to the failure toggle, usable after the backend is boxed
    pub fn failure_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failing)
    }

    fn next_session(&mut self) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        id
    }

    fn check_server(&self, server: &ServerSession) -> Result<(), BackendError> {
        if !self.server_connected(server) {
            return Err(BackendError::NotConnected);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("simulated query failure".to_string()));
        }
        Ok(())
    }

    fn tag_by_point(&self, point: PointId) -> Result<(&String, &TagData), BackendError> {
        self.tags
            .iter()
            .find(|(_, data)| data.id == point)
            .ok_or_else(|| BackendError::TagNotFound(format!("point id {}", point.0)))
    }
}

impl Backend for MemoryHistorian {
    fn connect_server(
        &mut self,
        server_name: &str,
        _credential: &Credential,
    ) -> Result<ServerSession, BackendError> {
        if server_name != self.server_name {
            return Err(BackendError::ServerNotFound(server_name.to_string()));
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!(
                "server {} unreachable",
                server_name
            )));
        }
        let id = self.next_session();
        self.server_session = Some(id);
        Ok(ServerSession(id))
    }

    fn connect_system(
        &mut self,
        server: &ServerSession,
        _credential: &Credential,
    ) -> Result<SystemSession, BackendError> {
        if !self.server_connected(server) {
            return Err(BackendError::NotConnected);
        }
        let id = self.next_session();
        self.system_session = Some(id);
        Ok(SystemSession(id))
    }

    fn open_database(
        &mut self,
        system: &SystemSession,
        database_name: &str,
    ) -> Result<DatabaseHandle, BackendError> {
        if !self.system_connected(system) {
            return Err(BackendError::NotConnected);
        }
        if !self.databases.iter().any(|d| d == database_name) {
            return Err(BackendError::DatabaseNotFound(database_name.to_string()));
        }
        let id = self.next_session();
        Ok(DatabaseHandle(id))
    }

    fn server_connected(&self, server: &ServerSession) -> bool {
        self.online.load(Ordering::SeqCst) && self.server_session == Some(server.0)
    }

    fn system_connected(&self, system: &SystemSession) -> bool {
        self.online.load(Ordering::SeqCst) && self.system_session == Some(system.0)
    }

    fn disconnect(&mut self) {
        self.server_session = None;
        self.system_session = None;
    }

    fn find_tag(&self, server: &ServerSession, name: &str) -> Result<TagRecord, BackendError> {
        self.check_server(server)?;
        let data = self
            .tags
            .get(name)
            .ok_or_else(|| BackendError::TagNotFound(name.to_string()))?;
        Ok(TagRecord {
            id: data.id,
            name: name.to_string(),
            source: data.source.clone(),
        })
    }

    fn find_tags(
        &self,
        server: &ServerSession,
        name_filter: &str,
        source_filter: &str,
    ) -> Result<Vec<TagRecord>, BackendError> {
        self.check_server(server)?;
        // BTreeMap iteration gives the name ordering for free
        Ok(self
            .tags
            .iter()
            .filter(|(name, data)| {
                wildcard_match(name_filter, name)
                    && (source_filter.is_empty() || data.source == source_filter)
            })
            .map(|(name, data)| TagRecord {
                id: data.id,
                name: name.clone(),
                source: data.source.clone(),
            })
            .collect())
    }

    fn recorded_range(
        &self,
        server: &ServerSession,
        point: PointId,
        range: TimeRange,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Sample>, BackendError> {
        self.check_server(server)?;
        let (name, data) = self.tag_by_point(point)?;
        Ok(data
            .samples
            .range(range.start..=range.end)
            .filter(|(_, (value, _))| filter.map_or(true, |f| !f.excludes(value)))
            .map(|(ts, (value, good))| Sample {
                tag: name.clone(),
                timestamp: *ts,
                value: value.clone(),
                quality_good: *good,
            })
            .collect())
    }

    fn recorded_by_count(
        &self,
        server: &ServerSession,
        point: PointId,
        anchor: DateTime<Utc>,
        count: usize,
        direction: Direction,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Sample>, BackendError> {
        self.check_server(server)?;
        let (name, data) = self.tag_by_point(point)?;
        let keep = |(_, (value, _)): &(&DateTime<Utc>, &(Value, bool))| {
            filter.map_or(true, |f| !f.excludes(value))
        };
        let make = |(ts, (value, good)): (&DateTime<Utc>, &(Value, bool))| Sample {
            tag: name.clone(),
            timestamp: *ts,
            value: value.clone(),
            quality_good: *good,
        };
        let samples = match direction {
            Direction::Forward => data
                .samples
                .range(anchor..)
                .filter(keep)
                .take(count)
                .map(make)
                .collect(),
            Direction::Backward => data
                .samples
                .range(..=anchor)
                .rev()
                .filter(keep)
                .take(count)
                .map(make)
                .collect(),
        };
        Ok(samples)
    }

    fn recorded_at(
        &self,
        server: &ServerSession,
        point: PointId,
        at: DateTime<Utc>,
    ) -> Result<Option<Sample>, BackendError> {
        self.check_server(server)?;
        let (name, data) = self.tag_by_point(point)?;
        Ok(data.samples.get(&at).map(|(value, good)| Sample {
            tag: name.clone(),
            timestamp: at,
            value: value.clone(),
            quality_good: *good,
        }))
    }

    fn units_of_measure(&self, system: &SystemSession) -> Result<Vec<UnitOfMeasure>, BackendError> {
        if !self.system_connected(system) {
            return Err(BackendError::NotConnected);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("simulated query failure".to_string()));
        }
        Ok(self.units.clone())
    }
}
