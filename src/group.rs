//! Route groups.
//!
//! A group collects routes under a common prefix, with its own middleware.
//! Groups nest; attaching one to the engine flattens it into ordinary routes
//! whose paths are joined with every enclosing prefix and whose middleware is
//! the enclosing groups' middleware, outermost first.
//!
//! ```
//! use rondo::Engine;
//!
//! let mut engine = Engine::classic();
//! engine.group("/api", |g| {
//!     g.group("/v1", |g| g.get("/users", || "users"))
//!         .get("/health", || "ok")
//! });
//! ```

use std::sync::Arc;

use crate::handler::{BoxedEndpoint, Handler, Setup};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::pattern::trim_trailing_slash;

type Pending = Box<dyn FnOnce(&mut Setup<'_>) -> BoxedEndpoint>;

/// A route waiting to be attached.
pub(crate) struct Entry {
    pub(crate) methods: Vec<Method>,
    pub(crate) path: String,
    pub(crate) build: Pending,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

enum Item {
    Route(Entry),
    Group(String, Group),
}

#[derive(Default)]
pub struct Group {
    items: Vec<Item>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<M>(self, methods: &[Method], path: &str, handler: impl Handler<M>) -> Self {
        self.route_with(methods, path, handler, Vec::new())
    }

    /// Like [`route`](Self::route), with middleware for this route alone.
    pub fn route_with<M>(
        mut self,
        methods: &[Method],
        path: &str,
        handler: impl Handler<M>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Self {
        self.items.push(Item::Route(Entry {
            methods: methods.to_vec(),
            path: path.to_owned(),
            build: Box::new(move |setup: &mut Setup<'_>| handler.into_endpoint(setup)),
            middleware,
        }));
        self
    }

    /// Registers for `GET` and `HEAD`.
    pub fn get<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Get, Method::Head], path, handler)
    }

    pub fn post<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Post], path, handler)
    }

    pub fn put<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Put], path, handler)
    }

    pub fn delete<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Delete], path, handler)
    }

    pub fn head<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Head], path, handler)
    }

    pub fn options<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Options], path, handler)
    }

    pub fn patch<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Patch], path, handler)
    }

    pub fn trace<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&[Method::Trace], path, handler)
    }

    pub fn any<M>(self, path: &str, handler: impl Handler<M>) -> Self {
        self.route(&Method::ALL, path, handler)
    }

    /// Adds middleware for every route in this group and its subgroups.
    pub fn use_middleware(mut self, m: impl Middleware) -> Self {
        self.middleware.push(Arc::new(m));
        self
    }

    /// Nests a group built by `build` under `prefix`.
    pub fn group(self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        self.nest(prefix, build(Group::new()))
    }

    /// Nests an already built group under `prefix`.
    pub fn nest(mut self, prefix: &str, group: Group) -> Self {
        self.items.push(Item::Group(prefix.to_owned(), group));
        self
    }

    /// Resolves every route to its full path and middleware list.
    pub(crate) fn flatten(self, prefix: &str, outer: &[Arc<dyn Middleware>], out: &mut Vec<Entry>) {
        let mut chain = outer.to_vec();
        chain.extend(self.middleware);

        for item in self.items {
            match item {
                Item::Route(mut entry) => {
                    entry.path = join(prefix, &entry.path);
                    let mut middleware = chain.clone();
                    middleware.append(&mut entry.middleware);
                    entry.middleware = middleware;
                    out.push(entry);
                }
                Item::Group(sub, group) => group.flatten(&join(prefix, &sub), &chain, out),
            }
        }
    }
}

/// Joins a group prefix and a route path with a single `/`.
pub(crate) fn join(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        return suffix.to_owned();
    }
    let joined = format!("{}/{}", prefix.trim_end_matches('/'), suffix.trim_start_matches('/'));
    match trim_trailing_slash(&joined) {
        "" => "/".to_owned(),
        p => p.to_owned(),
    }
}
