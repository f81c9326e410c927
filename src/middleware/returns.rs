use http::StatusCode;

use crate::context::Context;
use crate::middleware::Middleware;
use crate::reply::{Abort, Render, Reply};

/// Renders the action's result once the chain unwinds, unless something
/// already wrote the response.
///
/// | Result | Response |
/// |---|---|
/// | none, no route matched | `404` |
/// | none, route matched | empty `200` |
/// | anything else | per [`Reply::render`] in the route's [`Render`] mode |
#[derive(Clone, Copy, Debug, Default)]
pub struct Return;

impl Middleware for Return {
    fn handle(&self, ctx: &mut Context) {
        ctx.next();

        if ctx.written() {
            return;
        }

        let route = ctx.route();
        let reply = match (ctx.take_result(), &route) {
            (Some(reply), _) => reply,
            (None, None) => Reply::Abort(Abort::status(StatusCode::NOT_FOUND)),
            (None, Some(_)) => Reply::Nothing,
        };
        let mode = route.map_or(Render::Plain, |r| r.render());
        reply.render(mode, ctx.response());
    }
}
