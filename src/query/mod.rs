//! Typed query primitives
//!
//! The query layer sits on top of a [`Connection`](crate::connection::Connection)
//! and a resolved [`TagHandle`](crate::tags::TagHandle):
//!
//! - [`engine`]: the [`QueryEngine`] with the raw, interpolated, at-times,
//!   summary, and multi-tag operations
//! - [`interpolate`]: bracketing interpolation between recorded samples
//! - [`summary`]: periodic bucket aggregation under time-weighted or
//!   event-weighted bases
//!
//! # Query Pipeline
//!
//! ```text
//! TagHandle + TimeRange → recorded fetch (+ boundary brackets)
//!                       → interpolate / summarize → Vec<Sample>
//! ```

pub mod engine;
mod interpolate;
pub mod summary;

pub use engine::QueryEngine;
pub use summary::{CalculationBasis, SummaryKind, SummarySpec, TimestampPolicy};

// The server-side value filter rides along with query calls
pub use crate::backend::{CompareOp, FilterExpr};
