//! Incoming HTTP request type.

use bytes::Bytes;
use http::{HeaderMap, Uri, Version};

/// An incoming HTTP request with its body fully buffered.
///
/// Requests are shared behind an `Arc` for the lifetime of a [`Context`],
/// so handlers and injected actions read the same value without copying it.
///
/// [`Context`]: crate::Context
#[derive(Debug)]
pub struct Request {
    pub(crate) method: http::Method,
    pub(crate) uri: Uri,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Request {
    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req: Request = http::Request::builder()
            .uri("/users?id=4")
            .header("X-Trace", "abc")
            .body(Bytes::from_static(b"hi"))
            .unwrap()
            .into();

        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query(), Some("id=4"));
        assert_eq!(req.body().as_ref(), b"hi");
    }
}
