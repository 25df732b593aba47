//! Path segment trie.
//!
//! # Responsibilities
//! - Split a path into its segment trace
//! - Hold compiled route records at the node their path ends on
//!
//! # Design Decisions
//! - Segment kinds are an enum, so a literal segment can never collide
//!   with a reserved marker or the record slot
//! - A node may be an intermediate segment and a registration point at once

use std::collections::HashMap;
use std::sync::Arc;

use crate::pipeline::handler::Handler;
use crate::routing::method::MethodSet;
use crate::routing::RouteError;
use crate::validation::CompiledValidators;

/// Key of a child node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKey {
    /// The synthetic root token (`@`), standing for the empty path `/`.
    Root,
    /// An exact path segment.
    Literal(String),
    /// `*`: one dynamic segment, captured positionally.
    Param,
    /// `**`: one segment, matched but not captured.
    Multi,
    /// `***`: the remainder of the path.
    CatchAll,
}

impl SegmentKey {
    /// Classify a declared segment, returning the captured name for params.
    pub fn from_declared(segment: &str) -> (Self, Option<String>) {
        if let Some(name) = segment.strip_prefix("{:") {
            let name = name.strip_suffix('}').unwrap_or(name);
            return (SegmentKey::Param, Some(name.to_string()));
        }
        if let Some(name) = segment.strip_prefix(':') {
            return (SegmentKey::Param, Some(name.to_string()));
        }
        match segment {
            "*" => (SegmentKey::Param, Some("*".to_string())),
            "**" => (SegmentKey::Multi, None),
            "***" => (SegmentKey::CatchAll, None),
            other => (SegmentKey::Literal(other.to_string()), None),
        }
    }
}

/// The compiled form of one terminal route declaration.
pub struct RouteRecord {
    /// The accumulated declared path, e.g. `/api/users/{:id}`.
    pub path: String,
    pub methods: MethodSet,
    pub handlers: Vec<Handler>,
    /// Inherited then own middleware, outermost first.
    pub middlewares: Vec<Handler>,
    pub afters: Vec<Handler>,
    pub validators: Option<CompiledValidators>,
    /// Names of the dynamic segments, in path order.
    pub param_names: Vec<String>,
    pub intro: Option<String>,
}

impl std::fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRecord")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("handlers", &self.handlers.len())
            .field("middlewares", &self.middlewares.len())
            .field("afters", &self.afters.len())
            .field("param_names", &self.param_names)
            .finish()
    }
}

/// A trie node.
#[derive(Debug, Default)]
pub struct Node {
    children: HashMap<SegmentKey, Node>,
    records: Vec<Arc<RouteRecord>>,
}

impl Node {
    pub fn child(&self, key: &SegmentKey) -> Option<&Node> {
        self.children.get(key)
    }

    pub(crate) fn child_mut(&mut self, key: SegmentKey) -> &mut Node {
        self.children.entry(key).or_default()
    }

    pub fn literal(&self, segment: &str) -> Option<&Node> {
        self.children.get(&SegmentKey::Literal(segment.to_string()))
    }

    pub fn catch_all(&self) -> Option<&Node> {
        self.children.get(&SegmentKey::CatchAll)
    }

    /// Records registered exactly at this node, in registration order.
    pub fn records(&self) -> &[Arc<RouteRecord>] {
        &self.records
    }

    pub(crate) fn push_record(&mut self, record: Arc<RouteRecord>) {
        self.records.push(record);
    }

    /// Records that answer for a walk ending at this node.
    ///
    /// Falls back to the empty-segment child (`/path/`) and then to the
    /// catch-all child when the node itself has nothing registered.
    pub fn effective_records(&self) -> &[Arc<RouteRecord>] {
        if !self.records.is_empty() {
            return &self.records;
        }
        if let Some(trailing) = self.literal("") {
            if !trailing.records.is_empty() {
                return &trailing.records;
            }
        }
        match self.catch_all() {
            Some(catch_all) => catch_all.effective_records(),
            None => &[],
        }
    }

    pub(crate) fn walk_records<'a>(&'a self, out: &mut Vec<&'a Arc<RouteRecord>>) {
        out.extend(self.records.iter());
        for child in self.children.values() {
            child.walk_records(out);
        }
    }
}

/// Split a path into the segments following the root token.
///
/// `""` and `"/"` are the bare root (no segments). Any other path must start
/// with `/`. Empty segments are kept, so `/test/` yields `["test", ""]`.
pub fn trace(path: &str) -> Result<Vec<&str>, RouteError> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    match path.strip_prefix('/') {
        Some(rest) => Ok(rest.split('/').collect()),
        None => Err(RouteError::InvalidPath {
            path: path.to_string(),
        }),
    }
}
