//! # Historian Client
//!
//! A typed query client for a process historian (time-series tag
//! database): connection lifecycle management, tag resolution, and the
//! four query primitives — raw range, raw by count, interpolated, and
//! periodic summary reads — plus unit-of-measure reference data and a
//! canonical value formatter.
//!
//! The wire protocol to the historian is behind the [`backend::Backend`]
//! trait; an in-memory implementation backs tests and the demo binary.
//!
//! ## Modules
//!
//! - [`connection`]: lazy idempotent connect/disconnect over the
//!   server/system/database session triple
//! - [`tags`]: tag paths, handles, and name/wildcard resolution
//! - [`query`]: the query engine, interpolation, and summary aggregation
//! - [`format`]: canonical display strings for heterogeneous values
//! - [`uom`]: unit-of-measure reference data
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Duration;
//! use historian_client::{
//!     Config, Connection, MemoryHistorian, QueryEngine, TagResolver, TimeRange,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.historian.server_name = "SRV01".to_string();
//!     config.historian.database_name = "PlantDB".to_string();
//!
//!     let mut backend = MemoryHistorian::new("SRV01", "PlantDB");
//!     backend.add_tag("BC.X.PV", "scan1");
//!
//!     let mut conn = Connection::new(config, backend);
//!     let tag = TagResolver::new(&mut conn).resolve("BC.X.PV")?;
//!
//!     let range = TimeRange::last_hours(24);
//!     let samples = QueryEngine::new(&mut conn)
//!         .interpolated(&tag, range, Duration::seconds(600))?;
//!
//!     println!("{} interpolated samples", samples.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod format;
pub mod query;
pub mod tags;
pub mod time;
pub mod uom;
pub mod value;

// Re-export top-level types for convenience
pub use backend::{Backend, BackendError, MemoryHistorian, TagRecord};
pub use config::{Config, ConfigError, Credential, DisplayConfig, HistorianConfig, LoggingConfig};
pub use connection::Connection;
pub use error::{ClientError, ClientResult};
pub use format::ValueFormatter;
pub use query::{
    CalculationBasis, CompareOp, FilterExpr, QueryEngine, SummaryKind, SummarySpec,
    TimestampPolicy,
};
pub use tags::{TagHandle, TagPath, TagResolver};
pub use time::{Direction, TimeRange, TimeSpec};
pub use uom::{display_units, UnitOfMeasure};
pub use value::{Sample, Value};
