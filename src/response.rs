//! Response writer wrapper.
//!
//! Handlers and middleware never build a response value directly; they write
//! through a [`ResponseWriter`]. The wrapper records whether anything was
//! written and which status was committed, so later stages of the pipeline
//! can tell whether the response is already taken care of.

use std::io::Write;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::middleware::compress::Encoding;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values the framework sets on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// A handle to the response being built for one request.
///
/// Cloning the handle does not copy the response: every clone writes into the
/// same state. This is what lets a struct action hold the writer as a field
/// while middleware keeps using it through the [`Context`](crate::Context).
///
/// `written` flips to `true` on the first byte written or the first explicit
/// status and never flips back. Only the first [`write_header`] takes effect.
///
/// [`write_header`]: ResponseWriter::write_header
#[derive(Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<State>>,
}

struct State {
    status: StatusCode,
    written: bool,
    size: usize,
    headers: HeaderMap,
    body: BytesMut,
    encoder: Option<Encoder>,
}

enum Encoder {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Encoder {
    fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Gzip => Self::Gzip(GzEncoder::new(Vec::new(), Compression::default())),
            Encoding::Deflate => Self::Deflate(DeflateEncoder::new(Vec::new(), Compression::default())),
        }
    }

    fn encoding(&self) -> Encoding {
        match self {
            Self::Gzip(_) => Encoding::Gzip,
            Self::Deflate(_) => Encoding::Deflate,
        }
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Gzip(e) => e.write_all(data),
            Self::Deflate(e) => e.write_all(data),
        }
    }

    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Gzip(e) => e.finish(),
            Self::Deflate(e) => e.finish(),
        }
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                status: StatusCode::OK,
                written: false,
                size: 0,
                headers: HeaderMap::new(),
                body: BytesMut::new(),
                encoder: None,
            })),
        }
    }

    /// The committed status, `200` until [`write_header`](Self::write_header).
    pub fn status(&self) -> StatusCode {
        self.state.lock().status
    }

    pub fn written(&self) -> bool {
        self.state.lock().written
    }

    /// Bytes written so far, before any compression.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Commits `code` as the response status. Later calls are ignored.
    pub fn write_header(&self, code: StatusCode) {
        let mut state = self.state.lock();
        if state.written {
            debug!(current = %state.status, ignored = %code, "superfluous write_header");
            return;
        }
        state.status = code;
        state.written = true;
    }

    /// Appends `data` to the body, committing the current status.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        state.written = true;
        state.size += data.len();

        let State { encoder, headers, body, .. } = &mut *state;
        match encoder {
            Some(enc) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(sniff(data).as_str()));
                }
                if let Err(e) = enc.write(data) {
                    warn!("compression write failed: {e}");
                }
            }
            None => body.extend_from_slice(data),
        }
        data.len()
    }

    pub fn write_str(&self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    /// First value of header `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Replaces header `name`. Invalid names or values are dropped with a warning.
    pub fn set_header(&self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.state.lock().headers.insert(name, value);
        }
    }

    /// Adds a value to header `name`, keeping existing ones.
    pub fn append_header(&self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.state.lock().headers.append(name, value);
        }
    }

    pub fn remove_header(&self, name: &str) {
        self.state.lock().headers.remove(name);
    }

    pub fn set_content_type(&self, content_type: ContentType) {
        self.state
            .lock()
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Direct access to the header map. Do not call other writer methods
    /// while the guard is alive.
    pub fn headers_mut(&self) -> MappedMutexGuard<'_, HeaderMap> {
        MutexGuard::map(self.state.lock(), |s| &mut s.headers)
    }

    /// Routes every subsequent body write through `encoding`.
    pub fn set_encoding(&self, encoding: Encoding) {
        let mut state = self.state.lock();
        if state.encoder.is_none() {
            state.encoder = Some(Encoder::new(encoding));
        }
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.state.lock().encoder.as_ref().map(Encoder::encoding)
    }

    /// Flushes any encoder and turns the accumulated state into a response.
    pub(crate) fn finish(&self) -> http::Response<Full<Bytes>> {
        let mut state = self.state.lock();
        let mut body = std::mem::take(&mut state.body);

        if let Some(encoder) = state.encoder.take() {
            match encoder.finish() {
                Ok(encoded) => body.extend_from_slice(&encoded),
                Err(e) => warn!("compression flush failed: {e}"),
            }
            state.headers.remove(CONTENT_LENGTH);
        }

        let mut response = http::Response::new(Full::new(body.freeze()));
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        response
    }
}

impl Default for ResponseWriter {
    fn default() -> Self { Self::new() }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(n), Ok(v)) => Some((n, v)),
        _ => {
            warn!(header = name, "dropping invalid header");
            None
        }
    }
}

/// Minimal content sniffing for bodies written without a declared type.
fn sniff(data: &[u8]) -> ContentType {
    let head: Vec<u8> = data.iter().copied().skip_while(u8::is_ascii_whitespace).take(5).collect();
    match head.first() {
        Some(b'<') if head.len() > 1 && head[1].is_ascii_alphabetic() => ContentType::Html,
        Some(b'{') | Some(b'[') => ContentType::Json,
        _ if std::str::from_utf8(data).is_ok() => ContentType::Text,
        _ => ContentType::OctetStream,
    }
}
