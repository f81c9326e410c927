//! Handler return values and how they become HTTP bytes.
//!
//! Every handler returns something that implements [`IntoReply`]. The value
//! lands in the context's result slot as a [`Reply`], and the
//! [`Return`](crate::middleware::Return) middleware renders it once the
//! chain unwinds, unless something already wrote the response.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::json;

use crate::error::BoxError;
use crate::response::{ContentType, ResponseWriter};

// ── Abort ─────────────────────────────────────────────────────────────────────

/// An error that carries its own HTTP status.
///
/// ```
/// use rondo::{Abort, forbidden};
/// use http::StatusCode;
///
/// assert_eq!(forbidden().to_string(), "403 Forbidden");
/// assert_eq!(Abort::new(StatusCode::CONFLICT, "taken").code(), StatusCode::CONFLICT);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Abort {
    code: StatusCode,
    body: String,
}

impl Abort {
    pub fn new(code: StatusCode, body: impl Into<String>) -> Self {
        Self { code, body: body.into() }
    }

    /// Abort with the canonical `"<code> <reason>"` body.
    pub fn status(code: StatusCode) -> Self {
        Self { code, body: code.to_string() }
    }

    pub fn code(&self) -> StatusCode { self.code }
    pub fn body(&self) -> &str { &self.body }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

impl std::error::Error for Abort {}

pub fn abort(code: StatusCode) -> Abort { Abort::status(code) }
pub fn bad_request() -> Abort { Abort::status(StatusCode::BAD_REQUEST) }
pub fn unauthorized() -> Abort { Abort::status(StatusCode::UNAUTHORIZED) }
pub fn forbidden() -> Abort { Abort::status(StatusCode::FORBIDDEN) }
pub fn not_found() -> Abort { Abort::status(StatusCode::NOT_FOUND) }
pub fn method_not_allowed() -> Abort { Abort::status(StatusCode::METHOD_NOT_ALLOWED) }
pub fn internal_server_error() -> Abort { Abort::status(StatusCode::INTERNAL_SERVER_ERROR) }

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    /// The handler returned nothing. Renders an empty `200`.
    Nothing,
    Text(String),
    Bytes(Bytes),
    /// Always rendered as JSON.
    Json(serde_json::Value),
    /// An already-serialised XML document.
    Xml(String),
    /// A structured value, rendered according to the action's [`Render`] mode.
    Value(serde_json::Value),
    Abort(Abort),
    Error(BoxError),
}

/// How an action wants structured and error results rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Render {
    #[default]
    Plain,
    Json,
    Xml,
}

impl Reply {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// Wraps any error, keeping [`Abort`]s distinguishable.
    pub fn error(e: impl Into<BoxError>) -> Self {
        match e.into().downcast::<Abort>() {
            Ok(abort) => Self::Abort(*abort),
            Err(other) => Self::Error(other),
        }
    }

    /// Writes this reply to `w` as status + headers + body.
    pub fn render(self, mode: Render, w: &ResponseWriter) {
        match (self, mode) {
            (Self::Nothing, _) => w.write_header(StatusCode::OK),

            (Self::Abort(a), mode) => render_error(w, a.code, &a.body, mode),
            (Self::Error(e), mode) => render_error(w, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), mode),

            (Self::Text(s), Render::Plain) => ok(w, s.as_bytes()),
            (Self::Bytes(b), Render::Plain) => ok(w, &b),
            (Self::Text(s), mode) => render_content(w, &s, mode),
            (Self::Bytes(b), mode) => render_content(w, &String::from_utf8_lossy(&b), mode),

            (Self::Json(v), _) | (Self::Value(v), Render::Json) => write_json(w, StatusCode::OK, &v),
            (Self::Xml(s), _) => write_xml(w, StatusCode::OK, &s),
            (Self::Value(v), Render::Xml) => match quick_xml::se::to_string_with_root("xml", &v) {
                Ok(doc) => write_xml(w, StatusCode::OK, &doc),
                Err(e) => render_error(w, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), Render::Plain),
            },
            (Self::Value(v), Render::Plain) => ok(w, v.to_string().as_bytes()),
        }
    }
}

fn ok(w: &ResponseWriter, body: &[u8]) {
    w.write_header(StatusCode::OK);
    w.write(body);
}

fn render_error(w: &ResponseWriter, code: StatusCode, msg: &str, mode: Render) {
    match mode {
        Render::Plain => {
            w.write_header(code);
            w.write_str(msg);
        }
        Render::Json => write_json(w, code, &json!({ "err": msg })),
        Render::Xml => write_xml(w, code, &format!("<err>{}</err>", quick_xml::escape::escape(msg))),
    }
}

fn render_content(w: &ResponseWriter, content: &str, mode: Render) {
    match mode {
        Render::Json => write_json(w, StatusCode::OK, &json!({ "content": content })),
        _ => write_xml(
            w,
            StatusCode::OK,
            &format!("<content>{}</content>", quick_xml::escape::escape(content)),
        ),
    }
}

fn write_json(w: &ResponseWriter, code: StatusCode, v: &serde_json::Value) {
    let mut body = match serde_json::to_vec(v) {
        Ok(b) => b,
        Err(e) => return render_error(w, StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), Render::Plain),
    };
    body.push(b'\n');
    w.set_content_type(ContentType::Json);
    w.write_header(code);
    w.write(&body);
}

fn write_xml(w: &ResponseWriter, code: StatusCode, doc: &str) {
    w.set_content_type(ContentType::Xml);
    w.write_header(code);
    w.write_str(doc);
}

// ── Typed wrappers ────────────────────────────────────────────────────────────

/// Return `Json(value)` to always render `value` as `application/json`.
pub struct Json<T>(pub T);

/// Return `Xml(value)` to always render `value` as `application/xml`.
pub struct Xml<T>(pub T);

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply { self }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply { Reply::Nothing }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply { Reply::Text(self.to_owned()) }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply { Reply::Text(self) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Reply { Reply::Bytes(Bytes::from(self)) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Reply { Reply::Bytes(self) }
}

impl IntoReply for serde_json::Value {
    fn into_reply(self) -> Reply { Reply::Value(self) }
}

impl IntoReply for Abort {
    fn into_reply(self) -> Reply { Reply::Abort(self) }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Reply {
        match serde_json::to_value(&self.0) {
            Ok(v) => Reply::Json(v),
            Err(e) => Reply::Error(e.into()),
        }
    }
}

impl<T: Serialize> IntoReply for Xml<T> {
    fn into_reply(self) -> Reply {
        match quick_xml::se::to_string(&self.0) {
            Ok(doc) => Reply::Xml(doc),
            Err(e) => Reply::Error(e.into()),
        }
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Reply {
        self.map_or(Reply::Nothing, IntoReply::into_reply)
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(v) => v.into_reply(),
            Err(e) => Reply::error(e),
        }
    }
}
