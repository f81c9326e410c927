//! Dependency injection into struct actions.
//!
//! Each injector hands one kind of value to the action's setter for that
//! type, if it declared one, then yields. Actions without a matching setter
//! are skipped silently; function routes have no instance and are skipped
//! too.

use crate::context::Context;
use crate::middleware::Middleware;

/// Injects the captured path [`Params`](crate::Params).
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectParams;

impl Middleware for InjectParams {
    fn handle(&self, ctx: &mut Context) {
        if ctx.has_action() {
            let params = ctx.params().clone();
            ctx.inject(&params);
        }
        ctx.next();
    }
}

/// Injects the request as `Arc<Request>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectRequest;

impl Middleware for InjectRequest {
    fn handle(&self, ctx: &mut Context) {
        if ctx.has_action() {
            let req = ctx.shared_request();
            ctx.inject(&req);
        }
        ctx.next();
    }
}

/// Injects the [`ResponseWriter`](crate::ResponseWriter).
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectResponse;

impl Middleware for InjectResponse {
    fn handle(&self, ctx: &mut Context) {
        if ctx.has_action() {
            let w = ctx.response().clone();
            ctx.inject(&w);
        }
        ctx.next();
    }
}

/// Injects the engine's [`Logger`](crate::Logger).
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectLogger;

impl Middleware for InjectLogger {
    fn handle(&self, ctx: &mut Context) {
        if ctx.has_action() {
            let logger = ctx.logger().clone();
            ctx.inject(&logger);
        }
        ctx.next();
    }
}

/// Runs the action's `context` hooks with the live context.
#[derive(Clone, Copy, Debug, Default)]
pub struct InjectContext;

impl Middleware for InjectContext {
    fn handle(&self, ctx: &mut Context) {
        ctx.apply_context_hooks();
        ctx.next();
    }
}

/// Injects every dependency registered with
/// [`Engine::provide`](crate::Engine::provide).
#[derive(Clone, Copy, Debug, Default)]
pub struct Injector;

impl Middleware for Injector {
    fn handle(&self, ctx: &mut Context) {
        if ctx.has_action() {
            let inner = ctx.dependencies();
            for (key, dep) in &inner.deps {
                ctx.inject_erased(*key, &**dep);
            }
        }
        ctx.next();
    }
}

/// Calls the action's `before` hooks on the way in and `after` hooks on the
/// way out.
#[derive(Clone, Copy, Debug, Default)]
pub struct Events;

impl Middleware for Events {
    fn handle(&self, ctx: &mut Context) {
        ctx.fire_before();
        ctx.next();
        ctx.fire_after();
    }
}
