use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{AssertUnwindSafe, catch_unwind};

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::middleware::Middleware;
use crate::reply::{Abort, Reply};

/// Turns a panic anywhere downstream into a `500`.
///
/// The panic is logged with a backtrace. When nothing was written yet, the
/// result becomes a `500` abort, carrying the panic message in
/// [`Mode::Dev`](crate::Mode::Dev). The engine's error handler writes it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn handle(&self, ctx: &mut Context) {
        let Err(payload) = catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
            return;
        };

        let msg = panic_message(payload.as_ref());
        let trace = Backtrace::force_capture();
        error!(method = %ctx.method(), path = ctx.path(), panic = %msg, "handler panicked\n{trace}");

        if ctx.written() {
            return;
        }
        let abort = match ctx.config().is_dev() {
            true => Abort::new(StatusCode::INTERNAL_SERVER_ERROR, format!("panic: {msg}\n{trace}")),
            false => Abort::status(StatusCode::INTERNAL_SERVER_ERROR),
        };
        ctx.set_result(Reply::Abort(abort));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
