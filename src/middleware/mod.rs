//! Middleware.
//!
//! A middleware is anything that can handle a [`Context`]. It may do work,
//! call [`Context::next`] to run the rest of the chain, then do more work on
//! the way back. Not calling `next` skips everything downstream, the action
//! included.
//!
//! ```
//! use rondo::{Context, Engine};
//! use http::StatusCode;
//!
//! let mut engine = Engine::new();
//! engine.use_middleware(|ctx: &mut Context| {
//!     if ctx.header("authorization").is_none() {
//!         ctx.write_header(StatusCode::UNAUTHORIZED);
//!         return;
//!     }
//!     ctx.next();
//! });
//! ```
//!
//! [`Engine::classic`](crate::Engine::classic) installs the built-ins below in
//! the order they are listed.

use crate::context::Context;

pub mod compress;
mod inject;
mod logging;
mod recovery;
mod returns;

pub use compress::{Compress, CompressType, Encoding};
pub use inject::{Events, InjectContext, InjectLogger, InjectParams, InjectRequest, InjectResponse, Injector};
pub use logging::Logging;
pub use recovery::Recovery;
pub use returns::Return;

pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: &mut Context);
}

impl<F> Middleware for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut Context) {
        self(ctx)
    }
}
