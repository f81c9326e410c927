//! Per-request state.
//!
//! A [`Context`] is created for every request and dropped when the response
//! has been produced. It carries the request, the response writer, the
//! matched route, captured parameters, the middleware cursor and the result
//! slot the action's return value lands in.
//!
//! # The cursor
//!
//! ```text
//! engine middleware[0] → [1] → … → route middleware[0] → … → action
//!                    ↑ ctx.next() advances the cursor, then invokes
//! ```
//!
//! Code a middleware runs after `ctx.next()` returns is its unwind half.
//! Advancing past the end runs the action at most once, however many times
//! `next` is called.

use std::any::{Any, TypeId};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_DISPOSITION, LOCATION};
use hyper::upgrade::OnUpgrade;
use serde::Serialize;
use tracing::trace;

use crate::action::AnyAction;
use crate::config::Config;
use crate::cookie::{Cookies, SecureCookies};
use crate::engine::Inner;
use crate::error::Error;
use crate::handler::Shape;
use crate::log::Logger;
use crate::method::Method;
use crate::params::Params;
use crate::reply::{Abort, IntoReply, Reply};
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};
use crate::router::Route;

pub struct Context {
    inner: Arc<Inner>,
    idx: usize,
    executed: bool,

    req: Arc<Request>,
    verb: Option<Method>,
    resp: ResponseWriter,
    upgrade: Option<OnUpgrade>,

    matched: bool,
    route: Option<Arc<Route>>,
    params: Params,
    instantiated: bool,
    action: Option<Box<dyn AnyAction>>,

    result: Option<Reply>,
    started: Instant,
}

impl Context {
    pub(crate) fn new(inner: Arc<Inner>, req: Request, upgrade: Option<OnUpgrade>) -> Self {
        let verb = Method::try_from(&req.method).ok();
        Self {
            inner,
            idx: 0,
            executed: false,
            req: Arc::new(req),
            verb,
            resp: ResponseWriter::new(),
            upgrade,
            matched: false,
            route: None,
            params: Params::new(),
            instantiated: false,
            action: None,
            result: None,
            started: Instant::now(),
        }
    }

    // ── Chain ────────────────────────────────────────────────────────────────

    /// Yields to the rest of the chain. Returns once everything downstream,
    /// the action included, has run.
    pub fn next(&mut self) {
        self.idx += 1;
        self.invoke();
    }

    /// Runs the middleware at the cursor, or the action once the cursor is
    /// past every middleware.
    pub fn invoke(&mut self) {
        let engine_len = self.inner.middleware.len();
        if self.idx < engine_len {
            let m = Arc::clone(&self.inner.middleware[self.idx]);
            m.handle(self);
            return;
        }

        let route_mw = match self.route() {
            Some(route) => route.middleware.get(self.idx - engine_len).cloned(),
            None => None,
        };
        match route_mw {
            Some(m) => m.handle(self),
            None => self.execute(),
        }
    }

    fn execute(&mut self) {
        if self.executed {
            return;
        }
        self.executed = true;

        let Some(route) = self.route() else {
            return;
        };
        trace!(path = route.pattern(), "dispatching");
        let reply = route.endpoint.call(self);
        if !reply.is_nothing() {
            self.result = Some(reply);
        }
    }

    // ── Route resolution (lazy, memoised) ────────────────────────────────────

    fn resolve(&mut self) {
        if self.matched {
            return;
        }
        self.matched = true;
        let Some(verb) = self.verb else {
            return;
        };
        if let Some((route, params)) = self.inner.router.lookup(self.req.path(), verb) {
            self.route = Some(route);
            self.params = params;
        }
    }

    /// The matched route, resolving it on first access.
    pub fn route(&mut self) -> Option<Arc<Route>> {
        self.resolve();
        self.route.clone()
    }

    pub fn params(&mut self) -> &Params {
        self.resolve();
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        self.resolve();
        &mut self.params
    }

    /// How the matched target is called, if a route matched.
    pub fn shape(&mut self) -> Option<Shape> {
        let verb = self.verb?;
        self.route()?.shape(verb)
    }

    fn ensure_action(&mut self) {
        self.resolve();
        if !self.instantiated {
            self.instantiated = true;
            self.action = self.route.as_ref().and_then(|r| r.endpoint.instantiate());
        }
    }

    /// `true` when the matched route is a struct action.
    pub fn has_action(&mut self) -> bool {
        self.ensure_action();
        self.action.is_some()
    }

    /// This request's struct-action instance, if it is a `T`.
    pub fn action<T: 'static>(&mut self) -> Option<&mut T> {
        self.ensure_action();
        self.action.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Hands `dep` to the action's setter for `D`. Returns whether a setter
    /// took it.
    pub fn inject<D: Any>(&mut self, dep: &D) -> bool {
        self.inject_erased(TypeId::of::<D>(), dep)
    }

    pub(crate) fn inject_erased(&mut self, key: TypeId, dep: &dyn Any) -> bool {
        self.ensure_action();
        match self.action.as_mut() {
            Some(action) => action.inject(key, dep),
            None => false,
        }
    }

    pub(crate) fn take_action(&mut self) -> Option<Box<dyn AnyAction>> {
        self.ensure_action();
        self.action.take()
    }

    pub(crate) fn put_action(&mut self, action: Box<dyn AnyAction>) {
        self.action = Some(action);
    }

    pub(crate) fn apply_context_hooks(&mut self) {
        if let Some(mut action) = self.take_action() {
            action.set_context(self);
            self.action = Some(action);
        }
    }

    pub(crate) fn fire_before(&mut self) {
        self.ensure_action();
        if let Some(action) = self.action.as_mut() {
            action.before();
        }
    }

    pub(crate) fn fire_after(&mut self) {
        if let Some(action) = self.action.as_mut() {
            action.after();
        }
    }

    // ── Request side ─────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request {
        &self.req
    }

    /// The request as a shareable handle, the type actions inject.
    pub fn shared_request(&self) -> Arc<Request> {
        Arc::clone(&self.req)
    }

    pub fn method(&self) -> &http::Method {
        self.req.method()
    }

    /// The routable verb, `None` for extension methods.
    pub fn verb(&self) -> Option<Method> {
        self.verb
    }

    pub fn path(&self) -> &str {
        self.req.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.req.header(name)
    }

    pub fn req_body(&self) -> &Bytes {
        self.req.body()
    }

    pub fn cookies(&self) -> Cookies {
        Cookies::new(self.shared_request(), self.resp.clone())
    }

    pub fn secure_cookies(&self, secret: &str) -> SecureCookies {
        SecureCookies::new(self.cookies(), secret)
    }

    // ── Engine side ──────────────────────────────────────────────────────────

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn dependencies(&self) -> Arc<Inner> {
        Arc::clone(&self.inner)
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    // ── Result slot ──────────────────────────────────────────────────────────

    pub fn result(&self) -> Option<&Reply> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, value: impl IntoReply) {
        self.result = Some(value.into_reply());
    }

    pub fn take_result(&mut self) -> Option<Reply> {
        self.result.take()
    }

    // ── Response side ────────────────────────────────────────────────────────

    pub fn response(&self) -> &ResponseWriter {
        &self.resp
    }

    pub fn written(&self) -> bool {
        self.resp.written()
    }

    pub fn status(&self) -> StatusCode {
        self.resp.status()
    }

    pub fn write(&self, data: &[u8]) -> usize {
        self.resp.write(data)
    }

    pub fn write_str(&self, s: &str) -> usize {
        self.resp.write_str(s)
    }

    pub fn write_header(&self, code: StatusCode) {
        self.resp.write_header(code);
    }

    pub fn set_header(&self, name: &str, value: &str) {
        self.resp.set_header(name, value);
    }

    /// Writes the file at `path`, typed by its extension.
    pub fn serve_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        if self.resp.header("content-type").is_none() {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            self.resp.set_header("content-type", mime.as_ref());
        }
        self.resp.write(&data);
        Ok(())
    }

    /// Like [`serve_file`](Self::serve_file), as an attachment.
    pub fn download(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("download");
        self.resp
            .set_header(CONTENT_DISPOSITION.as_str(), &format!("attachment; filename=\"{name}\""));
        self.serve_file(path)
    }

    pub fn serve_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        let mut body = serde_json::to_vec(value)?;
        body.push(b'\n');
        self.resp.set_content_type(ContentType::Json);
        self.resp.write(&body);
        Ok(())
    }

    pub fn serve_xml<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        let doc = quick_xml::se::to_string(value).map_err(|e| Error::Xml(e.to_string()))?;
        self.resp.set_content_type(ContentType::Xml);
        self.resp.write_str(&doc);
        Ok(())
    }

    /// `302 Found` to `url`.
    pub fn redirect(&self, url: &str) {
        self.redirect_with(url, StatusCode::FOUND);
    }

    pub fn redirect_with(&self, url: &str, code: StatusCode) {
        self.resp.set_header(LOCATION.as_str(), url);
        self.resp.write_header(code);
    }

    /// Responds through the engine's error handler with `code` and `body`.
    pub fn abort(&mut self, code: StatusCode, body: &str) {
        self.result = Some(Reply::Abort(Abort::new(code, body)));
        self.run_error_handler();
    }

    fn abort_status(&mut self, code: StatusCode) {
        self.result = Some(Reply::Abort(Abort::status(code)));
        self.run_error_handler();
    }

    pub fn not_found(&mut self) {
        self.abort_status(StatusCode::NOT_FOUND);
    }

    pub fn not_found_with(&mut self, body: &str) {
        self.abort(StatusCode::NOT_FOUND, body);
    }

    pub fn unauthorized(&mut self) {
        self.abort_status(StatusCode::UNAUTHORIZED);
    }

    pub fn not_modified(&self) {
        self.resp.write_header(StatusCode::NOT_MODIFIED);
    }

    /// Takes over the connection once the response is sent.
    ///
    /// Commits `101 Switching Protocols`; set the `Upgrade` and `Connection`
    /// headers before calling. Await the returned handle on the runtime
    /// (`tokio::spawn`) to get the raw IO.
    pub fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        let upgrade = self.upgrade.take().ok_or(Error::Upgrade)?;
        self.resp.write_header(StatusCode::SWITCHING_PROTOCOLS);
        Ok(upgrade)
    }

    pub(crate) fn run_error_handler(&mut self) {
        let handler = Arc::clone(&self.inner.error_handler);
        handler.handle(self);
    }
}
