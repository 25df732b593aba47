//! Handler type and invocation.
//!
//! Handlers, middlewares, and after-hooks share one shape: an async function
//! over the mutable request context returning a [`RouteOutcome`] or an error.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::pipeline::{Context, RouteOutcome};

/// Boxed error returned by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future borrowing the context for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type HandlerResult = Result<RouteOutcome, BoxError>;

/// A route handler, middleware, or after-hook.
pub type Handler =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
///
/// ```ignore
/// let h = handler(|ctx| Box::pin(async move {
///     Ok(success(json!({ "id": ctx.params.get("id") })))
/// }));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A panic caught while running user code.
#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// Run one handler, turning a panic into a [`HandlerPanic`] error.
pub(crate) async fn invoke(h: &Handler, ctx: &mut Context) -> HandlerResult {
    // Calling `h` inside the future also catches panics raised while building it.
    match AssertUnwindSafe(async move { h(ctx).await }).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Box::new(HandlerPanic::from_payload(payload))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let p = HandlerPanic::from_payload(Box::new("boom"));
        assert_eq!(p.message, "boom");
        let p = HandlerPanic::from_payload(Box::new(String::from("bang")));
        assert_eq!(p.message, "bang");
        let p = HandlerPanic::from_payload(Box::new(42_u8));
        assert_eq!(p.message, "unknown panic payload");
    }

    #[tokio::test]
    async fn panic_before_the_future_is_caught() {
        let app = crate::Application::builder().build().unwrap();
        let inbound = crate::pipeline::Inbound::new(crate::pipeline::TransportKind::Http, "GET", "/");
        let mut ctx = Context::new(app, "r1".into(), inbound);
        let h = handler(|_ctx| panic!("eager"));
        let err = invoke(&h, &mut ctx).await.unwrap_err();
        let panic = err.downcast_ref::<HandlerPanic>().unwrap();
        assert_eq!(panic.message, "eager");
    }
}
