//! Pipeline engine subsystem.
//!
//! # Data Flow
//! ```text
//! Transport adapter
//!     → Inbound (method, pathinfo, query, body, headers)
//!     → Application::dispatch → Context
//!     → workflow.rs runs stages.rs in order:
//!         receive → validate → middleware → handle → response → after
//!     → Context.reply() → Rendered (status, headers, body)
//!     → Transport writes bytes
//! ```
//!
//! # Design Decisions
//! - Stages run strictly sequentially within one request
//! - A stage short-circuits by jumping forward to `response`
//! - `after` always runs and can never change the response
//! - Lifecycle hooks are typed slots, frozen before serving

pub mod context;
pub mod handler;
pub mod hooks;
pub mod outcome;
mod stages;
pub mod workflow;

pub use context::{Context, Inbound, Scratch, TransportKind};
pub use handler::{handler, BoxError, BoxFuture, Handler, HandlerPanic, HandlerResult};
pub use hooks::{Event, LifecycleHooks};
pub use outcome::{
    error, failed, redirect, response, result, success, Format, HttpError, HttpResponse,
    Rendered, RouteOutcome, Settled,
};
pub use workflow::{Stage, Transition, Workflow};
