//! HTTP method sets.
//!
//! A route declares the methods it accepts as a pipe-delimited string
//! (`"GET|POST"`), the wildcard `"ANY"`, or an empty string. Matching is
//! case-insensitive.

use std::fmt;

/// Wildcard token accepted by every request method.
pub const ANY: &str = "ANY";

/// The set of methods a route record accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet {
    methods: Vec<String>,
}

impl MethodSet {
    /// Parse a declaration like `"get|post"`.
    ///
    /// Empty tokens are dropped, so `""` yields a set that never accepts.
    pub fn parse(spec: &str) -> Self {
        let methods = spec
            .split('|')
            .map(|m| m.trim().to_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { methods }
    }

    /// Returns true if a request with `method` is accepted.
    pub fn accepts(&self, method: &str) -> bool {
        let method = method.to_uppercase();
        self.methods.iter().any(|m| m == ANY || *m == method)
    }

    /// True when no request can ever match this set.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// The uppercased method tokens, in declaration order.
    pub fn as_slice(&self) -> &[String] {
        &self.methods
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.methods.join("|"))
    }
}
