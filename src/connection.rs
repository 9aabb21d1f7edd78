//! Connection lifecycle management
//!
//! A historian session is a triple of handles: the server-level session,
//! the system-level session on top of it, and the opened database. The
//! three are only ever valid together; tearing one down invalidates all of
//! them, and every teardown bumps a generation counter that stales any
//! `TagHandle` minted under the old sessions.
//!
//! Connect is lazy and idempotent: resolvers and the query engine call
//! `ensure_connected` before touching the backend, and a call on an
//! already-live connection is a no-op. There is no per-query
//! connect/disconnect toggling and no automatic retry.

use crate::backend::{Backend, BackendError, DatabaseHandle, ServerSession, SystemSession};
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::tags::TagHandle;
use crate::uom::UnitOfMeasure;

struct SessionTriple {
    server: ServerSession,
    system: SystemSession,
    #[allow(dead_code)]
    database: DatabaseHandle,
}

/// A managed connection to one historian server + system + database
pub struct Connection {
    backend: Box<dyn Backend>,
    config: Config,
    sessions: Option<SessionTriple>,
    /// Bumped on every teardown; tag handles carry the generation they
    /// were minted under
    generation: u64,
}

impl Connection {
    /// Create a connection over a backend transport; does not connect yet
    pub fn new(config: Config, backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            config,
            sessions: None,
            generation: 0,
        }
    }

    /// The configuration this connection was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect if not already connected
    ///
    /// Idempotent: a call on a live connection does nothing. On failure no
    /// partial session survives.
    pub fn ensure_connected(&mut self) -> ClientResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        // A half-dead triple is torn down as a whole before reconnecting
        if self.sessions.is_some() {
            tracing::warn!("historian sessions went stale, reconnecting");
            self.disconnect();
        }

        let server_name = self.config.historian.server_name.clone();
        let database_name = self.config.historian.database_name.clone();
        let credential = self.config.credential.clone();

        let result = (|| -> Result<SessionTriple, BackendError> {
            let server = self.backend.connect_server(&server_name, &credential)?;
            let system = self.backend.connect_system(&server, &credential)?;
            let database = self.backend.open_database(&system, &database_name)?;
            Ok(SessionTriple {
                server,
                system,
                database,
            })
        })();

        match result {
            Ok(triple) => {
                tracing::info!(
                    server = %server_name,
                    database = %database_name,
                    "connected to historian"
                );
                self.sessions = Some(triple);
                Ok(())
            }
            Err(err) => {
                tracing::error!(server = %server_name, error = %err, "historian connect failed");
                self.backend.disconnect();
                self.sessions = None;
                Err(connect_error(err))
            }
        }
    }

    /// Whether the connection is live
    ///
    /// The server-level and system-level sessions are checked
    /// independently; both must report connected.
    pub fn is_connected(&self) -> bool {
        match &self.sessions {
            Some(triple) => {
                self.backend.server_connected(&triple.server)
                    && self.backend.system_connected(&triple.system)
            }
            None => false,
        }
    }

    /// Tear down the session triple; safe to call when already disconnected
    pub fn disconnect(&mut self) {
        if self.sessions.is_some() {
            self.backend.disconnect();
            self.sessions = None;
            self.generation += 1;
            tracing::info!("disconnected from historian");
        }
    }

    /// Unit-of-measure reference data for the connected system
    ///
    /// Scoped to the system, not the database. Returns the raw set;
    /// soft-deleted entries are filtered only for display
    /// (see [`crate::uom::display_units`]).
    pub fn units_of_measure(&mut self) -> ClientResult<Vec<UnitOfMeasure>> {
        self.ensure_connected()?;
        let system = self.system_session()?;
        self.backend
            .units_of_measure(&system)
            .map_err(query_error)
    }

    /// Verify a handle was minted under the current sessions
    pub(crate) fn check_handle(&self, handle: &TagHandle) -> ClientResult<()> {
        if handle.generation() != self.generation || self.sessions.is_none() {
            return Err(ClientError::StaleHandle(handle.name().to_string()));
        }
        Ok(())
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn server_session(&self) -> ClientResult<ServerSession> {
        self.sessions
            .as_ref()
            .map(|t| t.server)
            .ok_or_else(|| ClientError::Connection("not connected".to_string()))
    }

    pub(crate) fn system_session(&self) -> ClientResult<SystemSession> {
        self.sessions
            .as_ref()
            .map(|t| t.system)
            .ok_or_else(|| ClientError::Connection("not connected".to_string()))
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Map a backend failure during the connect handshake
///
/// Unknown server or database names are configuration problems; everything
/// else is a transport-level connection failure.
pub(crate) fn connect_error(err: BackendError) -> ClientError {
    match err {
        BackendError::ServerNotFound(name) => {
            ClientError::Configuration(format!("historian server not found: {}", name))
        }
        BackendError::DatabaseNotFound(name) => {
            ClientError::Configuration(format!("database not found: {}", name))
        }
        other => ClientError::Connection(other.to_string()),
    }
}

/// Map a backend failure during an in-flight query
pub(crate) fn query_error(err: BackendError) -> ClientError {
    match err {
        BackendError::TagNotFound(name) => ClientError::TagNotFound(name),
        other => ClientError::Transport(other.to_string()),
    }
}
