//! Route compilation.
//!
//! # Responsibilities
//! - Walk a forest of declarations depth-first
//! - Accumulate prefixes and inherited middleware/after chains
//! - Insert one record per terminal declaration into the trie
//!
//! # Design Decisions
//! - Children are compiled before their parent's own record
//! - Parent chains are concatenated parent-first, so outer middleware runs first
//! - Prefixes are concatenated verbatim; duplicate slashes are not collapsed
//! - Bare-root declarations are grouping nodes only, never matchable

use std::sync::Arc;

use crate::pipeline::handler::Handler;
use crate::routing::declaration::Router;
use crate::routing::method::MethodSet;
use crate::routing::tree::{trace, Node, RouteRecord, SegmentKey};
use crate::routing::RouteError;

/// The compiled, immutable route trie.
#[derive(Debug, Default)]
pub struct RouteTree {
    pub(crate) root: Node,
    count: usize,
}

impl RouteTree {
    /// Compile a set of declarations.
    pub fn compile<'a, I>(declarations: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = &'a Router>,
    {
        let mut tree = RouteTree::default();
        for declaration in declarations {
            tree.visit("", declaration, &[], &[])?;
        }
        tracing::debug!(routes = tree.count, "Route tree compiled");
        Ok(tree)
    }

    /// Compile a single declaration and its descendants.
    pub fn from_router(router: &Router) -> Result<Self, RouteError> {
        Self::compile(std::iter::once(router))
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Declared path and method set of every record.
    pub fn routes(&self) -> Vec<(String, String)> {
        let mut records = Vec::new();
        self.root.walk_records(&mut records);
        let mut routes: Vec<_> = records
            .into_iter()
            .map(|r| (r.path.clone(), r.methods.to_string()))
            .collect();
        routes.sort();
        routes
    }

    fn visit(
        &mut self,
        prefix: &str,
        declaration: &Router,
        middlewares: &[Handler],
        afters: &[Handler],
    ) -> Result<(), RouteError> {
        let middlewares = [middlewares, declaration.middlewares()].concat();
        let afters = [afters, declaration.afters()].concat();
        let path = format!("{}{}", prefix, declaration.prefix());

        for child in declaration.routers() {
            self.visit(&path, child, &middlewares, &afters)?;
        }

        let segments = trace(&path)?;
        if segments.is_empty() {
            return Ok(());
        }

        let validators = match declaration.validator_set() {
            Some(v) => {
                let compiled = v.compile().map_err(|e| RouteError::InvalidRule {
                    path: path.clone(),
                    field: e.field().to_string(),
                    rule: e.rule().to_string(),
                    reason: e.to_string(),
                })?;
                (!compiled.is_empty()).then_some(compiled)
            }
            None => None,
        };

        let mut param_names = Vec::new();
        let mut node = self.root.child_mut(SegmentKey::Root);
        for segment in segments {
            let (key, name) = SegmentKey::from_declared(segment);
            if let Some(name) = name {
                param_names.push(name);
            }
            node = node.child_mut(key);
        }

        let methods = MethodSet::parse(declaration.method_spec());
        if methods.is_empty() {
            tracing::trace!(path = %path, "Registered structural route without methods");
        }

        node.push_record(Arc::new(RouteRecord {
            path,
            methods,
            handlers: declaration.handlers().to_vec(),
            middlewares,
            afters,
            validators,
            param_names,
            intro: declaration.description().map(str::to_string),
        }));
        self.count += 1;
        Ok(())
    }
}
