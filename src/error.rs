//! Unified error type.

/// The error type returned by rondo's fallible operations.
///
/// Application-level failures (404, 403, a handler's own error) are carried
/// as [`Reply`](crate::Reply) values and rendered by the response pipeline,
/// not as `Error`s. This type surfaces setup mistakes and infrastructure
/// failures: a bad route pattern, binding a port, reading a file, loading a
/// certificate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported handler for `{path}`: {reason}")]
    UnsupportedHandler { path: String, reason: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(String),

    #[error("tls: {0}")]
    Tls(String),

    #[error("connection upgrade unavailable")]
    Upgrade,
}

/// Boxed error a handler may return; rendered as `500` unless it is an
/// [`Abort`](crate::Abort).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
