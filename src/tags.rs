//! Tag addressing and resolution
//!
//! A tag (point) is one named time-series channel on the historian. The
//! stable external addressing scheme is the hierarchical path
//! `\\Server[<serverName>]\Point[<tagName>]`; [`TagPath`] renders and
//! parses it. [`TagResolver`] turns names or wildcard filters into opaque
//! [`TagHandle`]s that the query engine accepts.
//!
//! Handles are bound to the connection generation that produced them:
//! after a disconnect they are stale and every use errors, forcing a
//! re-resolve against the fresh sessions.

use std::fmt;
use std::str::FromStr;

use crate::backend::PointId;
use crate::connection::{query_error, Connection};
use crate::error::{ClientError, ClientResult};

/// Hierarchical address of a tag on a named server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPath {
    pub server: String,
    pub tag: String,
}

impl TagPath {
    pub fn new(server: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r"\\Server[{}]\Point[{}]", self.server, self.tag)
    }
}

impl FromStr for TagPath {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::Configuration(format!("invalid tag path: {}", s));

        let rest = s.strip_prefix(r"\\Server[").ok_or_else(invalid)?;
        let (server, rest) = rest.split_once(']').ok_or_else(invalid)?;
        let rest = rest.strip_prefix(r"\Point[").ok_or_else(invalid)?;
        let tag = rest.strip_suffix(']').ok_or_else(invalid)?;

        if server.is_empty() || tag.is_empty() || tag.contains(']') {
            return Err(invalid());
        }

        Ok(Self::new(server, tag))
    }
}

/// Opaque reference to a resolved tag
///
/// Valid only for the connection (and connection generation) that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHandle {
    name: String,
    path: TagPath,
    point: PointId,
    generation: u64,
}

impl TagHandle {
    /// The resolved tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full hierarchical address of the tag
    pub fn path(&self) -> &TagPath {
        &self.path
    }

    pub(crate) fn point(&self) -> PointId {
        self.point
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Resolves tag names and wildcard filters against a connection
pub struct TagResolver<'a> {
    conn: &'a mut Connection,
}

impl<'a> TagResolver<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Resolve a tag by exact name
    ///
    /// Lazily connects. Fails with `TagNotFound` when no tag with that
    /// exact name exists; the connection stays valid.
    pub fn resolve(&mut self, name: &str) -> ClientResult<TagHandle> {
        self.conn.ensure_connected()?;
        let server = self.conn.server_session()?;
        let record = self
            .conn
            .backend()
            .find_tag(&server, name)
            .map_err(query_error)?;
        Ok(self.mint(record.name, record.id))
    }

    /// Find tags whose name matches a glob pattern (`*` wildcards),
    /// optionally restricted to one originating subsystem
    ///
    /// Returns a name-ordered sequence; no match is an empty result, not
    /// an error.
    pub fn find_by_filter(
        &mut self,
        pattern: &str,
        source_filter: &str,
    ) -> ClientResult<Vec<TagHandle>> {
        self.conn.ensure_connected()?;
        let server = self.conn.server_session()?;
        let records = self
            .conn
            .backend()
            .find_tags(&server, pattern, source_filter)
            .map_err(query_error)?;
        tracing::debug!(pattern, matches = records.len(), "tag filter search");
        Ok(records
            .into_iter()
            .map(|r| self.mint(r.name, r.id))
            .collect())
    }

    fn mint(&self, name: String, point: PointId) -> TagHandle {
        let server = self.conn.config().historian.server_name.clone();
        TagHandle {
            path: TagPath::new(server, name.clone()),
            name,
            point,
            generation: self.conn.generation(),
        }
    }
}

/// Glob matcher for tag name filters
///
/// `*` matches any run of characters (including none); everything else is
/// literal. A pattern without `*` must match exactly.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !candidate.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for part in &parts[1..parts.len() - 1] {
        match candidate[pos..].find(part) {
            Some(idx) => pos = pos + idx + part.len(),
            None => return false,
        }
    }

    candidate.len() >= pos + last.len() && candidate.ends_with(last)
}
