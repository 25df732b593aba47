//! Route declarations.
//!
//! A [`Router`] is the user-authored description of one path fragment:
//! its prefix, accepted methods, handlers, middleware, after-hooks,
//! validators, and nested sub-declarations. Declarations are plain values;
//! [`RouteTree::compile`](crate::routing::RouteTree::compile) reads them
//! once and never keeps a reference.

use std::fmt;

use crate::pipeline::handler::{handler, BoxFuture, Handler, HandlerResult};
use crate::pipeline::Context;
use crate::validation::Validators;

/// Options accepted by [`Router::with_options`] and [`Router::new_route`].
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Method set, e.g. `"GET|POST"` or `"ANY"`. Empty never matches.
    pub method: String,
    pub handlers: Vec<Handler>,
    pub middlewares: Vec<Handler>,
    pub afters: Vec<Handler>,
    pub validators: Option<Validators>,
    /// Free-form description, surfaced in route listings.
    pub intro: Option<String>,
    pub routers: Vec<Router>,
}

/// A route declaration, possibly nesting further declarations.
#[derive(Clone, Default)]
pub struct Router {
    prefix: String,
    method: String,
    handlers: Vec<Handler>,
    middlewares: Vec<Handler>,
    afters: Vec<Handler>,
    validators: Option<Validators>,
    intro: Option<String>,
    routers: Vec<Router>,
}

impl Router {
    /// A grouping declaration with the given prefix and no method.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// A declaration built from explicit options.
    pub fn with_options(prefix: impl Into<String>, options: RouteOptions) -> Self {
        Self {
            prefix: prefix.into(),
            method: options.method,
            handlers: options.handlers,
            middlewares: options.middlewares,
            afters: options.afters,
            validators: options.validators,
            intro: options.intro,
            routers: options.routers,
        }
    }

    /// Set the accepted method set.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Append a handler.
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.handlers.push(handler(f));
        self
    }

    /// Append a middleware. Inherited by every nested declaration.
    pub fn middleware<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.middlewares.push(handler(f));
        self
    }

    /// Append an after-hook. Inherited by every nested declaration.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.afters.push(handler(f));
        self
    }

    pub fn validators(mut self, validators: Validators) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn intro(mut self, intro: impl Into<String>) -> Self {
        self.intro = Some(intro.into());
        self
    }

    /// Nest a sub-declaration.
    pub fn add(mut self, router: Router) -> Self {
        self.routers.push(router);
        self
    }

    /// Nest a sub-declaration under an extra prefix.
    ///
    /// The sub-declaration is wrapped in a prefix-only grouping node, so the
    /// same router value can be mounted at several places.
    pub fn nest(self, prefix: impl Into<String>, router: Router) -> Self {
        self.add(Router::new(prefix).add(router))
    }

    /// Nest a new declaration built from options.
    pub fn new_route(self, prefix: impl Into<String>, options: RouteOptions) -> Self {
        self.add(Router::with_options(prefix, options))
    }

    /// Nest a single-handler declaration for `method`.
    pub fn push<F>(
        self,
        method: &str,
        prefix: impl Into<String>,
        f: F,
        validators: Option<Validators>,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        let mut route = Router::new(prefix).method(method).handler(f);
        route.validators = validators;
        self.add(route)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn method_spec(&self) -> &str {
        &self.method
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    pub fn middlewares(&self) -> &[Handler] {
        &self.middlewares
    }

    pub fn afters(&self) -> &[Handler] {
        &self.afters
    }

    pub fn validator_set(&self) -> Option<&Validators> {
        self.validators.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.intro.as_deref()
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("method", &self.method)
            .field("handlers", &self.handlers.len())
            .field("middlewares", &self.middlewares.len())
            .field("afters", &self.afters.len())
            .field("validators", &self.validators.is_some())
            .field("routers", &self.routers)
            .finish()
    }
}

macro_rules! method_routes {
    ($($method:literal => $name:ident, $with:ident;)*) => {
        /// Single-handler conveniences; the `_with` forms attach validators.
        impl Router {
            $(
                pub fn $name<F>(self, prefix: impl Into<String>, f: F) -> Self
                where
                    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
                {
                    self.push($method, prefix, f, None)
                }

                pub fn $with<F>(self, prefix: impl Into<String>, f: F, validators: Validators) -> Self
                where
                    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
                {
                    self.push($method, prefix, f, Some(validators))
                }
            )*
        }
    };
}

method_routes! {
    "GET" => get, get_with;
    "POST" => post, post_with;
    "PUT" => put, put_with;
    "PATCH" => patch, patch_with;
    "DELETE" => delete, delete_with;
    "ANY" => any, any_with;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RouteOutcome;

    #[test]
    fn convenience_methods_nest_declarations() {
        let root = Router::new("/api")
            .get("/users", |_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }))
            .post("/users", |_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }));

        assert_eq!(root.prefix(), "/api");
        assert_eq!(root.method_spec(), "");
        assert_eq!(root.routers().len(), 2);
        assert_eq!(root.routers()[0].method_spec(), "GET");
        assert_eq!(root.routers()[1].method_spec(), "POST");
        assert_eq!(root.routers()[1].handlers().len(), 1);
    }

    #[test]
    fn nest_wraps_in_prefix_group() {
        let module = Router::new("/module").method("ANY");
        let root = Router::new("/api").nest("/{:module}", module);

        let group = &root.routers()[0];
        assert_eq!(group.prefix(), "/{:module}");
        assert_eq!(group.routers()[0].prefix(), "/module");
    }

    #[test]
    fn with_variants_attach_validators() {
        use crate::validation::ValidatorConfig;

        let rules = Validators::new().body(ValidatorConfig::new().rule("name", "required"));
        let root = Router::new("/api")
            .put_with("/items", |_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }), rules.clone())
            .delete("/items", |_ctx| Box::pin(async { Ok(RouteOutcome::Pending) }));

        assert_eq!(root.routers()[0].method_spec(), "PUT");
        assert_eq!(root.routers()[0].validator_set(), Some(&rules));
        assert_eq!(root.routers()[1].validator_set(), None);
    }
}
