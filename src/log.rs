//! Application logger.
//!
//! A thin handle over a `tracing` span named after the application. Actions
//! receive it by declaring a setter for `Logger`; middleware reach it through
//! [`Context::logger`](crate::Context::logger). Events are emitted inside the
//! span, so whatever subscriber the binary installs sees the `app` field.

use tracing::Span;

#[derive(Clone, Debug)]
pub struct Logger {
    span: Span,
}

impl Logger {
    pub fn new(app: &str) -> Self {
        Self { span: tracing::info_span!("rondo", app = %app) }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, msg: &str) {
        self.span.in_scope(|| tracing::debug!("{msg}"));
    }

    pub fn info(&self, msg: &str) {
        self.span.in_scope(|| tracing::info!("{msg}"));
    }

    pub fn warn(&self, msg: &str) {
        self.span.in_scope(|| tracing::warn!("{msg}"));
    }

    pub fn error(&self, msg: &str) {
        self.span.in_scope(|| tracing::error!("{msg}"));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("rondo")
    }
}
