//! Cookies and signed cookies.
//!
//! A signed cookie's value is
//!
//! ```text
//! base64(value) "|" unix-seconds "|" hex(hmac-sha1(secret, base64(value) + unix-seconds))
//! ```
//!
//! and is rejected once it is older than 31 days.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use http::header::{COOKIE, SET_COOKIE};
use sha1::Sha1;

use crate::request::Request;
use crate::response::ResponseWriter;

type HmacSha1 = Hmac<Sha1>;

/// Signed cookies older than this are rejected.
pub const SECURE_COOKIE_MAX_AGE: u64 = 31 * 86400;

// ── Cookie ────────────────────────────────────────────────────────────────────

/// A `Set-Cookie` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Lifetime in seconds; `0` or less deletes the cookie.
    pub fn max_age(mut self, secs: i64) -> Self {
        self.max_age = Some(secs);
        self
    }

    pub fn secure(mut self, on: bool) -> Self {
        self.secure = on;
        self
    }

    pub fn http_only(mut self, on: bool) -> Self {
        self.http_only = on;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(age) = self.max_age {
            write!(f, "; Max-Age={}", age.max(0))?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// Reads request cookies and writes response cookies.
#[derive(Clone)]
pub struct Cookies {
    req: Arc<Request>,
    resp: ResponseWriter,
}

impl Cookies {
    pub(crate) fn new(req: Arc<Request>, resp: ResponseWriter) -> Self {
        Self { req, resp }
    }

    /// Every `name=value` pair sent in `Cookie` headers.
    pub fn all(&self) -> Vec<(String, String)> {
        self.req
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.all().into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn set(&self, cookie: Cookie) {
        self.resp.append_header(SET_COOKIE.as_str(), &cookie.to_string());
    }

    /// Tells the client to drop `name`.
    pub fn expire(&self, name: &str) {
        self.set(Cookie::new(name, "").path("/").max_age(0));
    }
}

// ── SecureCookies ─────────────────────────────────────────────────────────────

/// [`Cookies`] whose values are signed with a secret.
#[derive(Clone)]
pub struct SecureCookies {
    cookies: Cookies,
    secret: String,
}

impl SecureCookies {
    pub(crate) fn new(cookies: Cookies, secret: &str) -> Self {
        Self { cookies, secret: secret.to_owned() }
    }

    /// The verified value of `name`. Unsigned, tampered and expired cookies
    /// read as absent.
    pub fn get(&self, name: &str) -> Option<String> {
        parse_secure_cookie(&self.secret, &self.cookies.get(name)?)
    }

    /// Signs `cookie`'s value and sets it.
    pub fn set(&self, cookie: Cookie) {
        let signed = sign_at(&self.secret, &cookie.value, now());
        self.cookies.set(Cookie { value: signed, ..cookie });
    }

    pub fn expire(&self, name: &str) {
        self.cookies.expire(name);
    }
}

/// A cookie called `name` carrying `value` signed with `secret`.
pub fn new_secure_cookie(secret: &str, name: &str, value: &str) -> Cookie {
    Cookie::new(name, sign_at(secret, value, now()))
}

/// The original value of a signed cookie, if the signature holds and it is
/// at most 31 days old.
pub fn parse_secure_cookie(secret: &str, signed: &str) -> Option<String> {
    verify_at(secret, signed, now())
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

fn signature(secret: &str, encoded: &str, ts: &str) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(encoded.as_bytes());
    mac.update(ts.as_bytes());
    Some(mac)
}

fn sign_at(secret: &str, value: &str, ts: u64) -> String {
    let encoded = URL_SAFE.encode(value);
    let ts = ts.to_string();
    let sig = signature(secret, &encoded, &ts)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{encoded}|{ts}|{sig}")
}

fn verify_at(secret: &str, signed: &str, now: u64) -> Option<String> {
    let mut parts = signed.split('|');
    let (encoded, ts, sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    signature(secret, encoded, ts)?.verify_slice(&hex::decode(sig).ok()?).ok()?;

    let issued: u64 = ts.parse().ok()?;
    if now.saturating_sub(issued) > SECURE_COOKIE_MAX_AGE {
        return None;
    }

    String::from_utf8(URL_SAFE.decode(encoded).ok()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cret";

    fn request_with(cookie: &str) -> Arc<Request> {
        let req = http::Request::builder()
            .header("cookie", cookie)
            .body(bytes::Bytes::new())
            .unwrap();
        Arc::new(Request::from(req))
    }

    #[test]
    fn signed_value_round_trips() {
        let cookie = new_secure_cookie(SECRET, "sid", "user 42");
        assert_eq!(cookie.value().split('|').count(), 3);
        assert_eq!(parse_secure_cookie(SECRET, cookie.value()).as_deref(), Some("user 42"));
    }

    #[test]
    fn wrong_secret_or_tampering_is_rejected() {
        let signed = sign_at(SECRET, "v", 1_000);
        assert!(verify_at("other", &signed, 1_000).is_none());

        let tampered = signed.replacen("|1000|", "|1001|", 1);
        assert!(verify_at(SECRET, &tampered, 1_001).is_none());
        assert!(verify_at(SECRET, "plain", 1_000).is_none());
    }

    #[test]
    fn expires_after_31_days() {
        let signed = sign_at(SECRET, "v", 1_000);
        assert_eq!(verify_at(SECRET, &signed, 1_000 + SECURE_COOKIE_MAX_AGE).as_deref(), Some("v"));
        assert!(verify_at(SECRET, &signed, 1_001 + SECURE_COOKIE_MAX_AGE).is_none());
    }

    #[test]
    fn reads_request_cookies() {
        let cookies = Cookies::new(request_with("a=1; b=two"), ResponseWriter::new());
        assert_eq!(cookies.get("b").as_deref(), Some("two"));
        assert_eq!(cookies.get("c"), None);
        assert_eq!(cookies.all().len(), 2);
    }

    #[test]
    fn set_appends_set_cookie_headers() {
        let w = ResponseWriter::new();
        let cookies = Cookies::new(request_with(""), w.clone());
        cookies.set(Cookie::new("a", "1").path("/").http_only(true));
        cookies.expire("b");

        let headers = w.headers_mut();
        let values: Vec<_> = headers.get_all("set-cookie").iter().map(|v| v.to_str().unwrap()).collect();
        assert_eq!(values, ["a=1; Path=/; HttpOnly", "b=; Path=/; Max-Age=0"]);
    }

    #[test]
    fn secure_cookies_verify_what_they_set() {
        let signed = sign_at(SECRET, "token", now());
        let secure = SecureCookies::new(
            Cookies::new(request_with(&format!("sid={signed}; raw=x")), ResponseWriter::new()),
            SECRET,
        );
        assert_eq!(secure.get("sid").as_deref(), Some("token"));
        assert_eq!(secure.get("raw"), None);
    }
}
