//! # rondo
//!
//! A middleware-chained HTTP framework: a route table of literal and
//! patterned paths, handlers in several shapes, per-request struct actions
//! with injected dependencies, and automatic rendering of whatever a handler
//! returns.
//!
//! ## The request lifecycle
//!
//! ```text
//! Engine::handle
//!   └─ Context ── middleware[0].handle(ctx)
//!                   └─ ctx.next() ── middleware[1] … ── action
//!                   ← unwind: Return renders ctx.result() unless written
//!   └─ nothing written? error handler answers (404 when no route matched)
//! ```
//!
//! The core is synchronous. [`Server`] hosts an [`Engine`] on hyper and runs
//! each request on tokio's blocking pool.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rondo::{Action, Engine, Methods, Params, Render};
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct User {
//!     params: Params,
//! }
//!
//! impl User {
//!     fn get(&mut self) -> serde_json::Value {
//!         json!({ "id": self.params.get(":id") })
//!     }
//! }
//!
//! impl Action for User {
//!     fn methods(m: &mut Methods<Self>) {
//!         m.get(Self::get)
//!             .inject(|u: &mut Self, p: Params| u.params = p)
//!             .render(Render::Json);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rondo::Error> {
//!     let mut engine = Engine::classic();
//!     engine
//!         .get("/", || "hello")
//!         .get("/users/:id", User::default())
//!         .group("/api", |g| g.get("/ping", || "pong"));
//!     engine.run(Some(":8000")).await
//! }
//! ```

mod action;
mod config;
mod context;
mod cookie;
mod engine;
mod error;
mod group;
mod handler;
mod log;
mod method;
mod params;
mod pattern;
mod pool;
mod reply;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use action::{Action, ActionMethod, Methods};
pub use config::{Config, DEFAULT_ADDR, DEFAULT_MAX_BODY_SIZE, Mode};
pub use context::Context;
pub use cookie::{Cookie, Cookies, SECURE_COOKIE_MAX_AGE, SecureCookies, new_secure_cookie, parse_secure_cookie};
pub use engine::Engine;
pub use error::{BoxError, Error};
pub use group::Group;
pub use handler::{Handler, Shape};
pub use log::Logger;
pub use method::Method;
pub use params::Params;
pub use pool::{DEFAULT_POOL_SIZE, Pool};
pub use reply::{
    Abort, IntoReply, Json, Render, Reply, Xml, abort, bad_request, forbidden, internal_server_error,
    method_not_allowed, not_found, unauthorized,
};
pub use request::Request;
pub use response::{ContentType, ResponseWriter};
pub use router::Route;
pub use server::Server;
