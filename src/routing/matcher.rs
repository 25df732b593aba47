//! Route matching logic.
//!
//! # Responsibilities
//! - Walk the trie segment by segment for a request path
//! - Capture dynamic segments positionally
//! - Fall back to the nearest enclosing catch-all on a dead end
//! - Select the first record whose method set accepts the request
//!
//! # Design Decisions
//! - Fixed precedence per step: literal, `*`, `**`, `***`
//! - No backtracking across sibling branches
//! - Path and method are independent filters: a path hit with no accepting
//!   method is reported exactly like a miss
//! - O(segments) walk plus O(records) at the terminal node

use std::collections::HashMap;
use std::sync::Arc;

use crate::pipeline::handler::Handler;
use crate::routing::compiler::RouteTree;
use crate::routing::tree::{trace, Node, RouteRecord, SegmentKey};
use crate::validation::CompiledValidators;

/// The result of a successful match.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// The request path that was matched.
    pub pathinfo: String,
    /// Captured parameters keyed by declared name.
    pub params: HashMap<String, String>,
    record: Arc<RouteRecord>,
}

impl RouteInfo {
    pub fn record(&self) -> &Arc<RouteRecord> {
        &self.record
    }

    /// Declared path of the matched record.
    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn methods(&self) -> &[String] {
        self.record.methods.as_slice()
    }

    pub fn validators(&self) -> Option<&CompiledValidators> {
        self.record.validators.as_ref()
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.record.handlers
    }

    pub fn middlewares(&self) -> &[Handler] {
        &self.record.middlewares
    }

    pub fn afters(&self) -> &[Handler] {
        &self.record.afters
    }
}

impl RouteTree {
    /// Resolve `(pathinfo, method)` to a route.
    ///
    /// Returns `None` for malformed paths, dead ends without a catch-all,
    /// and structural matches whose records all reject `method`.
    pub fn match_route(&self, pathinfo: &str, method: &str) -> Option<RouteInfo> {
        let segments = trace(pathinfo).ok()?;
        let mut captured: Vec<&str> = Vec::new();
        let mut fallback: Option<&Node> = None;

        let walked = self
            .root
            .child(&SegmentKey::Root)
            .and_then(|root| walk(root, &segments, &mut captured, &mut fallback));

        let terminal = walked.or(fallback)?;
        let mut records = terminal.effective_records();
        if records.is_empty() {
            if let Some(fb) = fallback.filter(|fb| !std::ptr::eq(*fb, terminal)) {
                records = fb.effective_records();
            }
        }

        let record = records.iter().find(|r| r.methods.accepts(method))?;
        let params = record
            .param_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| captured.get(i).map(|v| (name.clone(), (*v).to_string())))
            .collect();

        Some(RouteInfo {
            pathinfo: pathinfo.to_string(),
            params,
            record: Arc::clone(record),
        })
    }
}

/// Walk `segments` from `node`. Returns the terminal node, or `None` on a
/// dead end. `fallback` tracks the nearest catch-all seen on the way.
fn walk<'t, 'p>(
    mut node: &'t Node,
    segments: &[&'p str],
    captured: &mut Vec<&'p str>,
    fallback: &mut Option<&'t Node>,
) -> Option<&'t Node> {
    for segment in segments {
        if let Some(catch_all) = node.catch_all() {
            *fallback = Some(catch_all);
        }
        if let Some(next) = node.literal(segment) {
            node = next;
        } else if let Some(next) = node.child(&SegmentKey::Param) {
            captured.push(segment);
            node = next;
        } else if let Some(next) = node.child(&SegmentKey::Multi) {
            node = next;
        } else if let Some(next) = node.catch_all() {
            return Some(next);
        } else {
            return None;
        }
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RouteOutcome;
    use crate::routing::Router;

    fn route(prefix: &str, method: &str) -> Router {
        Router::new(prefix)
            .method(method)
            .handler(|_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }))
    }

    fn tree(routes: Vec<Router>) -> RouteTree {
        RouteTree::compile(&routes).unwrap()
    }

    #[test]
    fn captures_named_params() {
        let t = tree(vec![route("/users/{:id}", "GET")]);
        let info = t.match_route("/users/42", "GET").unwrap();
        assert_eq!(info.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(info.params.len(), 1);
        assert_eq!(info.handlers().len(), 1);
        assert_eq!(info.pathinfo, "/users/42");
    }

    #[test]
    fn colon_and_brace_params_mix() {
        let t = tree(vec![route("/api/{:version}/users/:userId", "GET")]);
        let info = t.match_route("/api/v1/users/999", "GET").unwrap();
        assert_eq!(info.params["version"], "v1");
        assert_eq!(info.params["userId"], "999");
    }

    #[test]
    fn method_filter_rejects_unlisted() {
        let t = tree(vec![route("/multi", "GET|POST")]);
        assert!(t.match_route("/multi", "GET").is_some());
        assert!(t.match_route("/multi", "post").is_some());
        assert!(t.match_route("/multi", "DELETE").is_none());
    }

    #[test]
    fn method_miss_equals_path_miss() {
        let t = tree(vec![route("/only-get", "GET")]);
        assert_eq!(
            t.match_route("/only-get", "PUT").is_none(),
            t.match_route("/nowhere", "PUT").is_none()
        );
    }

    #[test]
    fn empty_method_never_matches() {
        let t = tree(vec![route("/structural", "")]);
        for m in ["GET", "POST", "ANY", ""] {
            assert!(t.match_route("/structural", m).is_none());
        }
    }

    #[test]
    fn literal_beats_wildcard() {
        let t = tree(vec![route("/a/{:x}", "GET"), route("/a/literal", "GET")]);

        let lit = t.match_route("/a/literal", "GET").unwrap();
        assert_eq!(lit.path(), "/a/literal");
        assert!(lit.params.is_empty());

        let wild = t.match_route("/a/other", "GET").unwrap();
        assert_eq!(wild.path(), "/a/{:x}");
        assert_eq!(wild.params["x"], "other");
    }

    #[test]
    fn catch_all_claims_unmatched_subpaths() {
        let t = tree(vec![
            route("/api/v1/***", "ANY"),
            route("/api/v1/users", "GET"),
        ]);
        assert_eq!(t.match_route("/api/v1/users", "GET").unwrap().path(), "/api/v1/users");
        assert_eq!(t.match_route("/api/v1/x/y/z", "GET").unwrap().path(), "/api/v1/***");
        // Dead end below a literal branch falls back to the catch-all.
        assert_eq!(t.match_route("/api/v1/users/7", "GET").unwrap().path(), "/api/v1/***");
        // The catch-all also answers for its own prefix.
        assert_eq!(t.match_route("/api/v1", "GET").unwrap().path(), "/api/v1/***");
    }

    #[test]
    fn nearest_catch_all_wins() {
        let t = tree(vec![
            route("/***", "ANY"),
            route("/api/***", "ANY"),
            route("/api/deep/leaf", "GET"),
        ]);
        assert_eq!(t.match_route("/api/deep/other", "GET").unwrap().path(), "/api/***");
        assert_eq!(t.match_route("/elsewhere", "GET").unwrap().path(), "/***");
        assert_eq!(t.match_route("/", "GET").unwrap().path(), "/***");
    }

    #[test]
    fn multi_segment_marker_is_not_captured() {
        let t = tree(vec![route("/files/**/{:name}", "GET")]);
        let info = t.match_route("/files/anything/readme", "GET").unwrap();
        assert_eq!(info.params.len(), 1);
        assert_eq!(info.params["name"], "readme");
    }

    #[test]
    fn trailing_slash_uses_empty_segment_records() {
        let t = tree(vec![route("/test/", "ANY")]);
        assert!(t.match_route("/test/", "GET").is_some());
        assert!(t.match_route("/test", "GET").is_some());
    }

    #[test]
    fn first_accepting_record_wins() {
        let t = tree(vec![route("/dup", "POST"), route("/dup", "ANY")]);
        let post = t.match_route("/dup", "POST").unwrap();
        let get = t.match_route("/dup", "GET").unwrap();
        assert_eq!(post.methods(), ["POST".to_string()]);
        assert_eq!(get.methods(), ["ANY".to_string()]);
    }

    #[test]
    fn nested_module_mount() {
        let defaults = |r: Router| {
            r.method("any")
                .handler(|_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }))
        };
        let module = Router::new("/module");
        let root = defaults(Router::new("/api/v1"))
            .add(defaults(Router::new("/***")))
            .add(module.clone())
            .nest("/{:module}", module);
        let t = RouteTree::from_router(&root).unwrap();
        assert!(t.match_route("/api/v1/module/123", "GET").is_some());
    }

    #[test]
    fn malformed_request_path_is_a_miss() {
        let t = tree(vec![route("/***", "ANY")]);
        assert!(t.match_route("no-slash", "GET").is_none());
    }

    #[test]
    fn round_trip_every_declared_path() {
        let declared = [
            ("/users", "GET"),
            ("/users/{:id}", "GET|PUT"),
            ("/users/{:id}/posts/:post", "GET"),
            ("/health", "ANY"),
        ];
        let t = tree(declared.iter().map(|(p, m)| route(p, m)).collect());
        for (path, method) in declared {
            let concrete = path
                .split('/')
                .map(|s| if s.starts_with("{:") || s.starts_with(':') { "v" } else { s })
                .collect::<Vec<_>>()
                .join("/");
            let m = method.split('|').next().unwrap();
            let m = if m == "ANY" { "GET" } else { m };
            let info = t.match_route(&concrete, m).unwrap();
            assert_eq!(info.path(), path);
            assert_eq!(
                info.params.len(),
                path.matches("{:").count() + path.matches("/:").count()
            );
        }
    }
}
