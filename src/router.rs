//! Route table.
//!
//! Two collections: an exact map keyed by literal path then method, and an
//! ordered list of compiled patterns. Exact routes always win; among
//! patterns, the earliest registration wins. Lookups are read-only, so the
//! table is shared across requests without locking once the engine serves.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use crate::error::Error;
use crate::handler::{BoxedEndpoint, Shape};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::middleware::compress::CompressType;
use crate::params::Params;
use crate::pattern::{self, Pattern};
use crate::reply::Render;

/// One registered route: a path, the verbs it answers and its target.
///
/// Immutable after registration.
pub struct Route {
    pattern: String,
    regex: Option<Pattern>,
    methods: Vec<Method>,
    pub(crate) endpoint: BoxedEndpoint,
    pub(crate) middleware: Arc<[Arc<dyn Middleware>]>,
}

impl Route {
    /// The path as registered, trailing slash removed.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn is_pattern(&self) -> bool {
        self.regex.is_some()
    }

    /// How the target is called for `method`.
    pub fn shape(&self, method: Method) -> Option<Shape> {
        self.endpoint.shape(method)
    }

    pub fn render(&self) -> Render {
        self.endpoint.render()
    }

    pub fn compress(&self) -> Option<CompressType> {
        self.endpoint.compress()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("is_pattern", &self.is_pattern())
            .finish()
    }
}

#[derive(Clone, Default)]
pub(crate) struct Router {
    exact: HashMap<String, HashMap<Method, Arc<Route>>>,
    patterns: Vec<Arc<Route>>,
}

impl Router {
    /// Registers `endpoint` for those of `methods` it can answer.
    ///
    /// Fails when `path` does not compile, or when the endpoint answers none
    /// of `methods`.
    pub(crate) fn add(
        &mut self,
        methods: &[Method],
        path: &str,
        endpoint: BoxedEndpoint,
        middleware: Arc<[Arc<dyn Middleware>]>,
    ) -> Result<(), Error> {
        let path = match pattern::trim_trailing_slash(path) {
            "" => "/",
            p => p,
        };

        let mut answered: Vec<Method> = Vec::with_capacity(methods.len());
        for &m in methods {
            if endpoint.shape(m).is_some() && !answered.contains(&m) {
                answered.push(m);
            }
        }
        if answered.is_empty() {
            return Err(Error::UnsupportedHandler {
                path: path.to_owned(),
                reason: format!("answers none of {methods:?}"),
            });
        }

        let regex = match pattern::is_pattern(path) {
            true => Some(Pattern::compile(path)?),
            false => None,
        };

        let route = Arc::new(Route {
            pattern: path.to_owned(),
            regex,
            methods: answered,
            endpoint,
            middleware,
        });
        debug!(path, methods = ?route.methods, pattern = route.is_pattern(), "route added");

        if route.is_pattern() {
            self.patterns.push(route);
        } else {
            let by_method = self.exact.entry(path.to_owned()).or_default();
            for &m in &route.methods {
                match by_method.entry(m) {
                    Entry::Occupied(_) => warn!(path, method = %m, "duplicate route ignored, first registration wins"),
                    Entry::Vacant(slot) => {
                        slot.insert(Arc::clone(&route));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolves `path` + `method` to a route and its captured parameters.
    ///
    /// `path` is percent-decoded first; routes and captures see the decoded
    /// form.
    pub(crate) fn lookup(&self, path: &str, method: Method) -> Option<(Arc<Route>, Params)> {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let path = match pattern::trim_trailing_slash(&decoded) {
            "" => "/",
            p => p,
        };

        if let Some(route) = self.exact.get(path).and_then(|m| m.get(&method)) {
            return Some((Arc::clone(route), Params::new()));
        }

        self.patterns
            .iter()
            .filter(|r| r.methods.contains(&method))
            .find_map(|r| {
                let caps = r.regex.as_ref()?.captures(path)?;
                let mut params = Params::new();
                for (k, v) in caps {
                    params.push(k, v);
                }
                Some((Arc::clone(r), params))
            })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.exact.values().flat_map(HashMap::values).count() + self.patterns.len()
    }
}
