//! Response compression.
//!
//! Compression is decided on the forward pass, before the action writes: the
//! middleware installs an encoder on the [`ResponseWriter`] and every later
//! write goes through it. The encoder is flushed when the response is
//! finished, at which point `Content-Length` is dropped.
//!
//! [`ResponseWriter`]: crate::ResponseWriter

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, VARY};
use tracing::trace;

use crate::context::Context;
use crate::middleware::Middleware;

/// A content coding the writer can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

/// An action's compression preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressType {
    Gzip,
    Deflate,
    /// Whichever the client accepts, gzip first.
    Auto,
}

impl CompressType {
    fn choose(self, accept: &str) -> Option<Encoding> {
        let accepts = |enc: Encoding| accepted(accept, enc.as_str());
        match self {
            Self::Gzip => accepts(Encoding::Gzip).then_some(Encoding::Gzip),
            Self::Deflate => accepts(Encoding::Deflate).then_some(Encoding::Deflate),
            Self::Auto => [Encoding::Gzip, Encoding::Deflate].into_iter().find(|&e| accepts(e)),
        }
    }
}

/// `true` when `Accept-Encoding` lists `coding` (or `*`) without `q=0`.
fn accepted(accept: &str, coding: &str) -> bool {
    accept.split(',').any(|item| {
        let mut parts = item.split(';').map(str::trim);
        let name = parts.next().unwrap_or("");
        let refused = parts.any(|p| {
            p.strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        });
        (name.eq_ignore_ascii_case(coding) || name == "*") && !refused
    })
}

/// Compresses responses of actions that ask for it, and of paths whose
/// extension is on the configured list.
#[derive(Clone, Debug, Default)]
pub struct Compress {
    extensions: Vec<String>,
}

impl Compress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compress any request path ending in one of `exts` (`".js"`,
    /// `".css"`, …), whatever the route.
    pub fn extensions<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { extensions: exts.into_iter().map(Into::into).collect() }
    }

    fn preference(&self, ctx: &mut Context) -> Option<CompressType> {
        if let Some(kind) = ctx.route().and_then(|r| r.compress()) {
            return Some(kind);
        }
        let path = ctx.path();
        self.extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
            .then_some(CompressType::Auto)
    }
}

impl Middleware for Compress {
    fn handle(&self, ctx: &mut Context) {
        let accept = ctx.header(ACCEPT_ENCODING.as_str()).unwrap_or("").to_owned();
        let encoding = match self.preference(ctx) {
            Some(kind) if !accept.is_empty() => kind.choose(&accept),
            _ => None,
        };

        if let Some(encoding) = encoding {
            trace!(encoding = encoding.as_str(), path = ctx.path(), "compressing response");
            let w = ctx.response();
            w.set_header(CONTENT_ENCODING.as_str(), encoding.as_str());
            w.append_header(VARY.as_str(), "Accept-Encoding");
            w.set_encoding(encoding);
        }

        ctx.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_encoding_is_parsed() {
        assert!(accepted("gzip, deflate", "gzip"));
        assert!(accepted("deflate;q=0.5, GZIP", "gzip"));
        assert!(accepted("*", "deflate"));
        assert!(!accepted("gzip;q=0", "gzip"));
        assert!(!accepted("br", "gzip"));
    }

    #[test]
    fn preference_meets_client() {
        assert_eq!(CompressType::Gzip.choose("deflate"), None);
        assert_eq!(CompressType::Deflate.choose("gzip, deflate"), Some(Encoding::Deflate));
        assert_eq!(CompressType::Auto.choose("deflate"), Some(Encoding::Deflate));
        assert_eq!(CompressType::Auto.choose("gzip, deflate"), Some(Encoding::Gzip));
    }
}
