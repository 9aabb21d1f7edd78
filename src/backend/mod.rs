//! Backend transport seam
//!
//! The client never speaks the historian's wire format itself. Everything
//! below the query façade goes through the [`Backend`] trait: session
//! establishment against the server/system/database triple, recorded-value
//! reads, tag search, and reference-data fetches. A production deployment
//! plugs in a transport implementation; tests and the demo binary use the
//! in-memory historian from [`memory`].
//!
//! The trait deliberately exposes only *recorded* data primitives.
//! Interpolation and summaries are synthesized client-side by the query
//! engine, so a backend stays a thin mirror of what the historian's native
//! protocol actually serves.

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::Credential;
use crate::time::{Direction, TimeRange};
use crate::uom::UnitOfMeasure;
use crate::value::{Sample, Value};

pub use memory::MemoryHistorian;

/// Opaque server-level session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSession(pub(crate) u64);

/// Opaque system-level session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSession(pub(crate) u64);

/// Opaque handle to an opened database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHandle(pub(crate) u64);

/// Backend identifier of a tag (point)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointId(pub(crate) u64);

/// A tag as known to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// Backend point identifier
    pub id: PointId,
    /// Tag name
    pub name: String,
    /// Originating subsystem (interface, scanner, calculation engine)
    pub source: String,
}

/// Comparison operator for server-side value filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Server-side value filter: recorded samples whose value matches the
/// comparison are dropped before the result leaves the backend
///
/// Mirrors historian filter expressions of the form `'tag' < 0` with
/// filtered values excluded from the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterExpr {
    pub op: CompareOp,
    pub threshold: f64,
}

impl FilterExpr {
    /// Filter that excludes samples comparing true against `threshold`
    pub fn exclude(op: CompareOp, threshold: f64) -> Self {
        Self { op, threshold }
    }

    /// Whether a value is excluded by this filter
    ///
    /// Non-numeric values are never excluded; the filter only speaks
    /// about magnitudes.
    pub fn excludes(&self, value: &Value) -> bool {
        let Some(v) = value.as_f64() else {
            return false;
        };
        match self.op {
            CompareOp::Lt => v < self.threshold,
            CompareOp::Le => v <= self.threshold,
            CompareOp::Gt => v > self.threshold,
            CompareOp::Ge => v >= self.threshold,
            CompareOp::Eq => v == self.threshold,
            CompareOp::Ne => v != self.threshold,
        }
    }
}

/// Errors reported by a backend transport
#[derive(Error, Debug)]
pub enum BackendError {
    /// The named server is not known to the transport
    #[error("server not found: {0}")]
    ServerNotFound(String),

    /// The named database does not exist on the system
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    /// Credential rejected during the handshake
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Operation attempted without a live session
    #[error("not connected")]
    NotConnected,

    /// No tag with the requested name
    #[error("tag not found: {0}")]
    TagNotFound(String),

    /// Transport failure during an in-flight request
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Transport interface to a historian server
///
/// Implementations are synchronous and blocking; callers serialize access
/// through `&mut` receivers on the owning connection.
pub trait Backend {
    /// Establish a server-level session
    fn connect_server(
        &mut self,
        server_name: &str,
        credential: &Credential,
    ) -> Result<ServerSession, BackendError>;

    /// Establish the system-level session on top of a server session
    fn connect_system(
        &mut self,
        server: &ServerSession,
        credential: &Credential,
    ) -> Result<SystemSession, BackendError>;

    /// Open a named database within the system
    fn open_database(
        &mut self,
        system: &SystemSession,
        database_name: &str,
    ) -> Result<DatabaseHandle, BackendError>;

    /// Liveness of the server-level session
    fn server_connected(&self, server: &ServerSession) -> bool;

    /// Liveness of the system-level session
    fn system_connected(&self, system: &SystemSession) -> bool;

    /// Tear down all sessions
    fn disconnect(&mut self);

    /// Look up a tag by exact name
    fn find_tag(&self, server: &ServerSession, name: &str) -> Result<TagRecord, BackendError>;

    /// Search tags by name pattern (glob `*` wildcards) and optional
    /// source filter; empty `source_filter` matches every source.
    /// Returns an empty, name-ordered list when nothing matches.
    fn find_tags(
        &self,
        server: &ServerSession,
        name_filter: &str,
        source_filter: &str,
    ) -> Result<Vec<TagRecord>, BackendError>;

    /// Recorded samples with timestamp inside the closed range, in
    /// chronological order, after applying the optional value filter
    fn recorded_range(
        &self,
        server: &ServerSession,
        point: PointId,
        range: TimeRange,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Sample>, BackendError>;

    /// Up to `count` recorded samples walking from `anchor` in the given
    /// direction; the anchor itself is included when a sample exists there.
    /// The optional value filter applies before counting, so the walk
    /// continues past excluded samples.
    fn recorded_by_count(
        &self,
        server: &ServerSession,
        point: PointId,
        anchor: DateTime<Utc>,
        count: usize,
        direction: Direction,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<Sample>, BackendError>;

    /// Recorded sample at an exact timestamp, if one exists
    fn recorded_at(
        &self,
        server: &ServerSession,
        point: PointId,
        at: DateTime<Utc>,
    ) -> Result<Option<Sample>, BackendError>;

    /// Unit-of-measure reference data, scoped to the system (not the
    /// database); includes soft-deleted entries
    fn units_of_measure(&self, system: &SystemSession) -> Result<Vec<UnitOfMeasure>, BackendError>;
}
