//! The engine: route table, middleware and the per-request entry point.
//!
//! Setup happens through `&mut self` builders; serving only reads. The shared
//! state sits behind an `Arc`, so an engine clones cheaply into every
//! connection task. Registering after a clone copies the state first and
//! never affects clones already serving.

use std::any::{Any, TypeId};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;
use tracing::error;

use crate::config::{self, Config};
use crate::context::Context;
use crate::error::Error;
use crate::group::{Entry, Group};
use crate::handler::{BoxedEndpoint, Handler, Setup};
use crate::log::Logger;
use crate::method::Method;
use crate::middleware::{
    Compress, Events, InjectContext, InjectLogger, InjectParams, InjectRequest, InjectResponse, Injector,
    Logging, Middleware, Recovery, Return,
};
use crate::pool::Pools;
use crate::reply::{Abort, Reply};
use crate::request::Request;
use crate::router::Router;
use crate::server::Server;

#[derive(Clone)]
pub(crate) struct Inner {
    pub(crate) router: Router,
    pub(crate) pools: Pools,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) error_handler: Arc<dyn Middleware>,
    pub(crate) logger: Logger,
    pub(crate) config: Config,
    pub(crate) deps: Vec<(TypeId, Arc<dyn Any + Send + Sync>)>,
}

/// The application.
///
/// ```rust,no_run
/// use rondo::{Engine, forbidden};
///
/// #[tokio::main]
/// async fn main() -> Result<(), rondo::Error> {
///     let mut engine = Engine::classic();
///     engine
///         .get("/", || "hello")
///         .patch("/locked", || forbidden());
///     engine.run(None).await
/// }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// An engine with no middleware and the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                router: Router::default(),
                pools: Pools::default(),
                middleware: Vec::new(),
                error_handler: Arc::new(default_error_handler),
                logger: Logger::default(),
                config,
                deps: Vec::new(),
            }),
        }
    }

    /// An engine with the standard middleware stack.
    pub fn classic() -> Self {
        Self::classic_with(Config::default())
    }

    /// The standard stack: logging, panic recovery, compression, result
    /// rendering, then the injectors and action events.
    pub fn classic_with(config: Config) -> Self {
        let mut engine = Self::with_config(config);
        engine
            .use_middleware(Logging)
            .use_middleware(Recovery)
            .use_middleware(Compress::new())
            .use_middleware(Return)
            .use_middleware(InjectParams)
            .use_middleware(InjectContext)
            .use_middleware(InjectRequest)
            .use_middleware(InjectResponse)
            .use_middleware(InjectLogger)
            .use_middleware(Injector)
            .use_middleware(Events);
        engine
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn set_logger(&mut self, logger: Logger) -> &mut Self {
        self.inner_mut().logger = logger;
        self
    }

    /// Appends `m` to the engine chain.
    pub fn use_middleware(&mut self, m: impl Middleware) -> &mut Self {
        self.inner_mut().middleware.push(Arc::new(m));
        self
    }

    /// Replaces the handler that answers requests nothing wrote.
    ///
    /// It runs with the result slot holding the [`Reply`] to report, a 404
    /// abort when no route matched.
    pub fn error_handler(&mut self, handler: impl Middleware) -> &mut Self {
        self.inner_mut().error_handler = Arc::new(handler);
        self
    }

    /// Registers `value` for injection into every action declaring a setter
    /// for `D`. Registering the same type again replaces the value.
    pub fn provide<D: Any + Send + Sync>(&mut self, value: D) -> &mut Self {
        let key = TypeId::of::<D>();
        let deps = &mut self.inner_mut().deps;
        deps.retain(|(k, _)| *k != key);
        deps.push((key, Arc::new(value)));
        self
    }

    // ── Registration ─────────────────────────────────────────────────────────

    fn add(
        &mut self,
        methods: &[Method],
        path: &str,
        build: impl FnOnce(&mut Setup<'_>) -> BoxedEndpoint,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), Error> {
        let inner = self.inner_mut();
        let mut setup = Setup { pools: &mut inner.pools, pool_size: inner.config.pool_size };
        let endpoint = build(&mut setup);
        inner.router.add(methods, path, endpoint, Arc::from(middleware))
    }

    /// Registers `handler` for `methods` at `path`.
    pub fn try_route<M>(&mut self, methods: &[Method], path: &str, handler: impl Handler<M>) -> Result<&mut Self, Error> {
        self.add(methods, path, |setup| handler.into_endpoint(setup), Vec::new())?;
        Ok(self)
    }

    /// Registers `handler` for `methods` at `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or the handler answers none of
    /// `methods`. Use [`try_route`](Self::try_route) to handle that instead.
    pub fn route<M>(&mut self, methods: &[Method], path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route_with(methods, path, handler, Vec::new())
    }

    /// Like [`route`](Self::route), with middleware that runs for this route
    /// only, after the engine chain.
    pub fn route_with<M>(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: impl Handler<M>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> &mut Self {
        self.add(methods, path, |setup| handler.into_endpoint(setup), middleware)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Registers for `GET` and `HEAD`.
    pub fn get<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Get, Method::Head], path, handler)
    }

    pub fn post<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Post], path, handler)
    }

    pub fn put<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Put], path, handler)
    }

    pub fn delete<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Delete], path, handler)
    }

    pub fn head<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Head], path, handler)
    }

    pub fn options<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Options], path, handler)
    }

    pub fn patch<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Patch], path, handler)
    }

    pub fn trace<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&[Method::Trace], path, handler)
    }

    /// Registers for every method the handler answers.
    pub fn any<M>(&mut self, path: &str, handler: impl Handler<M>) -> &mut Self {
        self.route(&Method::ALL, path, handler)
    }

    /// Builds a group with `build` and attaches it under `prefix`.
    pub fn group(&mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> &mut Self {
        self.attach(prefix, build(Group::new()))
    }

    /// Attaches `group` under `prefix`.
    ///
    /// # Panics
    ///
    /// Panics on the first route [`route`](Self::route) would reject.
    pub fn attach(&mut self, prefix: &str, group: Group) -> &mut Self {
        let mut entries = Vec::new();
        group.flatten(prefix, &[], &mut entries);
        for Entry { methods, path, build, middleware } in entries {
            self.add(&methods, &path, build, middleware)
                .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        }
        self
    }

    // ── Serving ──────────────────────────────────────────────────────────────

    /// Serves one request end to end.
    pub fn handle(&self, mut req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let upgrade = req.extensions_mut().remove::<OnUpgrade>();
        let mut ctx = Context::new(Arc::clone(&self.inner), Request::from(req), upgrade);
        ctx.invoke();

        if !ctx.written() {
            if ctx.result().is_none() {
                ctx.set_result(Abort::status(StatusCode::NOT_FOUND));
            }
            ctx.run_error_handler();

            let _span = self.inner.logger.span().enter();
            error!(method = %ctx.method(), path = ctx.path(), status = ctx.status().as_u16(), "request not answered");
        }

        ctx.response().finish()
    }

    /// Serves on `addr`, or the configured address, until SIGTERM or Ctrl-C.
    pub async fn run(self, addr: Option<&str>) -> Result<(), Error> {
        let addr = config::socket_addr(addr.unwrap_or(self.inner.config.addr.as_str()));
        Server::bind(&addr)?.serve(self).await
    }

    /// Like [`run`](Self::run), over TLS with the PEM files at `cert` and `key`.
    pub async fn run_tls(self, cert: impl AsRef<Path>, key: impl AsRef<Path>, addr: Option<&str>) -> Result<(), Error> {
        let addr = config::socket_addr(addr.unwrap_or(self.inner.config.addr.as_str()));
        Server::bind(&addr)?.serve_tls(self, cert.as_ref(), key.as_ref()).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the result as an error response: an abort's own status and body,
/// otherwise `500`.
fn default_error_handler(ctx: &mut Context) {
    let abort = match ctx.take_result() {
        Some(Reply::Abort(abort)) => abort,
        Some(Reply::Error(e)) => Abort::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        _ => Abort::status(StatusCode::INTERNAL_SERVER_ERROR),
    };
    ctx.write_header(abort.code());
    ctx.write_str(abort.body());
}
