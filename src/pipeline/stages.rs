//! Stage functions.
//!
//! Every stage before `response` catches what user code returns and turns it
//! into the context's settled value; nothing escapes to the transport.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::pipeline::handler::{invoke, Handler};
use crate::pipeline::hooks::Event;
use crate::pipeline::outcome::{failed, HttpError, RouteOutcome, Settled};
use crate::pipeline::workflow::{Stage, Transition};
use crate::pipeline::Context;

pub(crate) async fn run(stage: Stage, ctx: &mut Context) -> Transition {
    match stage {
        Stage::Receive => receive(ctx),
        Stage::Validate => validate(ctx),
        Stage::Middleware => middleware(ctx).await,
        Stage::Handle => handle(ctx).await,
        Stage::Response => response(ctx),
        Stage::After => after(ctx).await,
    }
}

fn receive(ctx: &mut Context) -> Transition {
    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::Receive, ctx);

    let Some(info) = app.routes().match_route(&ctx.pathinfo, &ctx.method) else {
        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            pathinfo = %ctx.pathinfo,
            "No route matched"
        );
        app.hooks().emit(Event::NotFound, ctx);
        ctx.settle(Settled::Error(HttpError::new(404, "Not Found")));
        return Transition::Jump(Stage::Response);
    };

    ctx.params = info.params.clone();
    if ctx.debug() {
        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            pathinfo = %ctx.pathinfo,
            route = %info.path(),
            validators = ?info.validators().map(|v| v.source()),
            params = ?ctx.params,
            query = %ctx.query,
            body = %ctx.body,
            "Route matched"
        );
    }
    ctx.router = Some(info);
    Transition::Next
}

fn validate(ctx: &mut Context) -> Transition {
    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::Validate, ctx);

    let Some(validators) = ctx.router.as_ref().and_then(|r| r.validators()) else {
        return Transition::Next;
    };

    let mut check = Map::new();
    let parts = [
        ("params", validators.params.as_ref(), ctx.params_value()),
        ("query", validators.query.as_ref(), ctx.query.clone()),
        ("body", validators.body.as_ref(), ctx.body.clone()),
    ];
    for (name, rules, data) in parts {
        let Some(rules) = rules else { continue };
        let errors = rules.check(&data);
        if !errors.is_empty() {
            check.insert(name.to_string(), serde_json::json!(errors));
        }
    }

    if check.is_empty() {
        return Transition::Next;
    }
    tracing::debug!(
        request_id = %ctx.request_id,
        parts = check.len(),
        "Request validation failed"
    );
    if let Some(settled) = failed(Value::Object(check), "400;Bad Request Data", 400).into_settled() {
        ctx.settle(settled);
    }
    Transition::Jump(Stage::Response)
}

async fn middleware(ctx: &mut Context) -> Transition {
    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::Middleware, ctx);

    for mw in chain(ctx, |r| r.middlewares()) {
        if run_settling(&mw, ctx).await {
            return Transition::Jump(Stage::Response);
        }
    }
    Transition::Next
}

async fn handle(ctx: &mut Context) -> Transition {
    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::Handle, ctx);

    for h in chain(ctx, |r| r.handlers()) {
        if run_settling(&h, ctx).await {
            break;
        }
    }
    Transition::Next
}

fn response(ctx: &mut Context) -> Transition {
    let Some(settled) = ctx.response.take() else {
        ctx.finalize();
        return Transition::Next;
    };

    if let Settled::Thrown(err) = &settled {
        tracing::error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            pathinfo = %ctx.pathinfo,
            stage = ?ctx.curr.stage,
            error = %err,
            "Request failed"
        );
    }
    let resp = settled.to_response(ctx.debug());
    if ctx.debug() {
        tracing::debug!(
            request_id = %ctx.request_id,
            status = resp.status,
            data = %resp.data,
            "Response settled"
        );
    }
    ctx.settle(Settled::Response(resp));
    ctx.finalize();

    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::Response, ctx);
    Transition::Next
}

/// After-hooks see the settled response but cannot change the reply.
async fn after(ctx: &mut Context) -> Transition {
    let app = Arc::clone(&ctx.app);
    app.hooks().emit(Event::After, ctx);

    for hook in chain(ctx, |r| r.afters()) {
        if let Err(err) = invoke(&hook, ctx).await {
            tracing::warn!(
                request_id = %ctx.request_id,
                error = %err,
                "After hook failed"
            );
            app.hooks().emit_after_error(ctx, &err);
        }
    }
    Transition::Next
}

fn chain(ctx: &Context, pick: impl Fn(&crate::routing::RouteInfo) -> &[Handler]) -> Vec<Handler> {
    ctx.router.as_ref().map(|r| pick(r).to_vec()).unwrap_or_default()
}

/// Run one handler; returns true when it settled the context.
async fn run_settling(h: &Handler, ctx: &mut Context) -> bool {
    match invoke(h, ctx).await {
        Ok(RouteOutcome::Pending) => false,
        Ok(outcome) => {
            if let Some(settled) = outcome.into_settled() {
                ctx.settle(settled);
            }
            true
        }
        Err(err) => {
            ctx.curr.error = Some(err.to_string());
            ctx.settle(Settled::from_error(err));
            true
        }
    }
}
