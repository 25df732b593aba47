//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Router declarations (nested)
//!     → compiler.rs (prefix + middleware/after accumulation)
//!     → tree.rs (segment trie, records at terminal nodes)
//!     → Freeze as immutable RouteTree
//!
//! Incoming Request (pathinfo, method)
//!     → matcher.rs (segment walk, catch-all fallback, method filter)
//!     → Return: RouteInfo or no route
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path (segment lookups only)
//! - Deterministic: same input always matches same route
//! - First registered record wins among siblings at one node

pub mod compiler;
pub mod declaration;
pub mod matcher;
pub mod method;
pub mod tree;

pub use compiler::RouteTree;
pub use declaration::{RouteOptions, Router};
pub use matcher::RouteInfo;
pub use method::MethodSet;
pub use tree::{RouteRecord, SegmentKey};

/// Errors raised while compiling route declarations.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route path {path:?}: must be empty or start with '/'")]
    InvalidPath { path: String },

    #[error("invalid validator rule {rule:?} for field {field:?} on route {path}: {reason}")]
    InvalidRule {
        path: String,
        field: String,
        rule: String,
        reason: String,
    },
}
