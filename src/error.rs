//! Client error types
//!
//! One taxonomy for the whole query façade. The split mirrors where a
//! failure occurs: resolving configured names at connect time, the
//! connect/authenticate handshake itself, tag resolution, or an in-flight
//! query after a successful connect.

use thiserror::Error;

/// Errors surfaced by the historian client
#[derive(Error, Debug)]
pub enum ClientError {
    /// A configured server or database name does not resolve to a known
    /// entity at connect time. Fatal; re-check configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level connect or authenticate failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Tag name did not resolve. Local to the failing query; the
    /// connection stays valid.
    #[error("tag not found: {0}")]
    TagNotFound(String),

    /// Failure during an in-flight query after a successful connect.
    /// Connection state is left as-is; the caller may retry the query
    /// without reconnecting.
    #[error("transport error: {0}")]
    Transport(String),

    /// A tag handle was used after the connection that produced it was
    /// torn down.
    #[error("stale tag handle: {0} (resolve the tag again)")]
    StaleHandle(String),

    /// Time range with start after end.
    #[error("invalid time range: start must not be after end")]
    InvalidTimeRange,

    /// Interpolation interval or summary bucket below the historian's
    /// millisecond resolution (zero, negative, or sub-millisecond).
    #[error("invalid interval: must be at least one millisecond")]
    InvalidInterval,
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
