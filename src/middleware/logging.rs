use tracing::{error, info, warn};

use crate::context::Context;
use crate::middleware::Middleware;

/// One line per request, leveled by status class.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logging;

impl Middleware for Logging {
    fn handle(&self, ctx: &mut Context) {
        ctx.next();

        if !ctx.written() {
            // The engine logs unanswered requests itself.
            return;
        }
        let status = ctx.status();
        let elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        let method = ctx.method().as_str();
        let path = ctx.path();

        let _span = ctx.logger().span().enter();
        match status.as_u16() {
            500.. => error!(method, path, status = status.as_u16(), elapsed_ms, "request"),
            400..=499 => warn!(method, path, status = status.as_u16(), elapsed_ms, "request"),
            _ => info!(method, path, status = status.as_u16(), elapsed_ms, "request"),
        }
    }
}
