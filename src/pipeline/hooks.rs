//! Typed lifecycle hooks.
//!
//! Hooks observe the pipeline; they never change its control flow. They are
//! registered on the application builder and frozen before serving begins.

use std::collections::HashMap;
use std::sync::Arc;

use crate::pipeline::handler::BoxError;
use crate::pipeline::Context;

/// A point in the pipeline hooks can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Receive,
    Validate,
    Middleware,
    Handle,
    Response,
    After,
    /// No accepting route for the request.
    NotFound,
}

pub type Hook = Arc<dyn Fn(&Context) + Send + Sync>;

/// Receives errors returned by after-hooks.
pub type AfterErrorHook = Arc<dyn Fn(&Context, &BoxError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct LifecycleHooks {
    slots: HashMap<Event, Vec<Hook>>,
    after_error: Vec<AfterErrorHook>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, event: Event, f: F)
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.slots.entry(event).or_default().push(Arc::new(f));
    }

    pub fn on_after_error<F>(&mut self, f: F)
    where
        F: Fn(&Context, &BoxError) + Send + Sync + 'static,
    {
        self.after_error.push(Arc::new(f));
    }

    pub fn emit(&self, event: Event, ctx: &Context) {
        if let Some(hooks) = self.slots.get(&event) {
            for hook in hooks {
                hook(ctx);
            }
        }
    }

    pub fn emit_after_error(&self, ctx: &Context, err: &BoxError) {
        for hook in &self.after_error {
            hook(ctx, err);
        }
    }

    /// Number of hooks registered for `event`.
    pub fn count(&self, event: Event) -> usize {
        self.slots.get(&event).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.slots.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("LifecycleHooks")
            .field("slots", &counts)
            .field("after_error", &self.after_error.len())
            .finish()
    }
}
