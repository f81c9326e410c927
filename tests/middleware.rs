//! Middleware chain behaviour and the context helpers handlers lean on.

mod common;

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::read::GzDecoder;
use http::StatusCode;
use parking_lot::Mutex;
use rondo::middleware::{Compress, Middleware, Return};
use rondo::{Config, Context, Cookie, Engine, Error, Group, Method, Mode, parse_secure_cookie};
use serde_json::json;

use common::{header, request, request_with, text};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn mark(log: &Log, name: &'static str) -> impl Middleware {
    let log = Arc::clone(log);
    move |ctx: &mut Context| {
        log.lock().push(name);
        ctx.next();
    }
}

fn route_mark(log: &Log, name: &'static str) -> Arc<dyn Middleware> {
    Arc::new(mark(log, name))
}

#[test]
fn calling_next_twice_runs_the_action_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::new();
    engine.use_middleware(Return).use_middleware(|ctx: &mut Context| {
        ctx.next();
        ctx.next();
    });
    let c = Arc::clone(&calls);
    engine.get("/", move || {
        c.fetch_add(1, Ordering::SeqCst);
        "ran"
    });

    assert_eq!(text(engine.handle(request("GET", "/"))), "ran");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn engine_then_group_then_route_middleware() {
    let log: Log = Arc::default();
    let mut engine = Engine::new();
    engine.use_middleware(Return).use_middleware(mark(&log, "engine"));

    let l = Arc::clone(&log);
    engine.route_with(
        &[Method::Get],
        "/solo",
        move || {
            l.lock().push("handler");
            "solo"
        },
        vec![route_mark(&log, "route")],
    );

    let l = Arc::clone(&log);
    let group = Group::new().use_middleware(mark(&log, "group")).route_with(
        &[Method::Get],
        "/member",
        move || {
            l.lock().push("handler");
            "member"
        },
        vec![route_mark(&log, "route")],
    );
    engine.attach("/g", group);

    assert_eq!(text(engine.handle(request("GET", "/solo"))), "solo");
    assert_eq!(*log.lock(), ["engine", "route", "handler"]);

    log.lock().clear();
    assert_eq!(text(engine.handle(request("GET", "/g/member"))), "member");
    assert_eq!(*log.lock(), ["engine", "group", "route", "handler"]);
}

#[test]
fn middleware_can_short_circuit() {
    let mut engine = Engine::classic();
    engine
        .use_middleware(|ctx: &mut Context| {
            if ctx.header("authorization").is_none() {
                ctx.unauthorized();
                return;
            }
            ctx.next();
        })
        .get("/", || "secret");

    let resp = engine.handle(request("GET", "/"));
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(text(resp), "401 Unauthorized");

    let resp = engine.handle(request_with("GET", "/", &[("authorization", "token")], Default::default()));
    assert_eq!(text(resp), "secret");
}

fn panicking(mode: Mode) -> Engine {
    let mut engine = Engine::classic_with(Config { mode, ..Config::default() });
    engine.get("/", || -> &'static str { panic!("boom") });
    engine
}

#[test]
fn recovery_reports_panics_in_dev() {
    let resp = panicking(Mode::Dev).handle(request("GET", "/"));
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text(resp).starts_with("panic: boom"));
}

#[test]
fn recovery_hides_panics_in_prod() {
    let resp = panicking(Mode::Prod).handle(request("GET", "/"));
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(resp), "500 Internal Server Error");
}

#[test]
fn no_compression_without_accept_encoding() {
    let mut engine = Engine::new();
    engine
        .use_middleware(Compress::extensions([".js"]))
        .use_middleware(Return)
        .get("/app.js", || "let x = 1;");

    let resp = engine.handle(request("GET", "/app.js"));
    assert!(resp.headers().get("content-encoding").is_none());
    assert_eq!(text(resp), "let x = 1;");
}

#[test]
fn listed_extensions_are_compressed() {
    let mut engine = Engine::new();
    engine
        .use_middleware(Compress::extensions([".js"]))
        .use_middleware(Return)
        .get("/app.js", || "let x = 1;")
        .get("/app.css", || "body {}");

    let gzip = [("accept-encoding", "gzip")];
    let resp = engine.handle(request_with("GET", "/app.js", &gzip, Default::default()));
    assert_eq!(header(&resp, "content-encoding"), Some("gzip"));
    let mut out = String::new();
    GzDecoder::new(common::body(resp).as_ref()).read_to_string(&mut out).unwrap();
    assert_eq!(out, "let x = 1;");

    let resp = engine.handle(request_with("GET", "/app.css", &gzip, Default::default()));
    assert!(resp.headers().get("content-encoding").is_none());
    assert_eq!(text(resp), "body {}");
}

// ── Context helpers ───────────────────────────────────────────────────────────

#[test]
fn serves_and_downloads_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "remember the milk").unwrap();

    let mut engine = Engine::classic();
    let p = path.clone();
    engine.get("/file", move |ctx: &mut Context| ctx.serve_file(&p));
    engine.get("/download", move |ctx: &mut Context| ctx.download(&path));
    engine.get("/missing", |ctx: &mut Context| ctx.serve_file("/nonexistent/file.txt"));

    let resp = engine.handle(request("GET", "/file"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "content-type"), Some("text/plain"));
    assert_eq!(text(resp), "remember the milk");

    let resp = engine.handle(request("GET", "/download"));
    assert_eq!(header(&resp, "content-disposition"), Some("attachment; filename=\"notes.txt\""));
    assert_eq!(text(resp), "remember the milk");

    let resp = engine.handle(request("GET", "/missing"));
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn redirects_and_json() {
    let mut engine = Engine::classic();
    engine
        .get("/old", |ctx: &mut Context| ctx.redirect("/new"))
        .get("/data", |ctx: &mut Context| ctx.serve_json(&json!({ "a": 1 })));

    let resp = engine.handle(request("GET", "/old"));
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(header(&resp, "location"), Some("/new"));

    let resp = engine.handle(request("GET", "/data"));
    assert_eq!(header(&resp, "content-type"), Some("application/json"));
    assert_eq!(text(resp), "{\"a\":1}\n");
}

#[test]
fn not_found_goes_through_the_error_handler() {
    let mut engine = Engine::classic();
    engine
        .error_handler(|ctx: &mut Context| {
            ctx.write_header(StatusCode::NOT_FOUND);
            ctx.write_str("custom: ");
            if let Some(rondo::Reply::Abort(a)) = ctx.take_result() {
                ctx.write_str(a.body());
            }
        })
        .get("/gone", |ctx: &mut Context| ctx.not_found_with("gone"));

    let resp = engine.handle(request("GET", "/gone"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(resp), "custom: gone");
}

#[test]
fn reads_and_sets_cookies() {
    let mut engine = Engine::classic();
    engine.get("/", |ctx: &mut Context| {
        let cookies = ctx.cookies();
        cookies.set(Cookie::new("seen", "1").path("/"));
        ctx.secure_cookies("k").set(Cookie::new("sid", "v"));
        cookies.get("name").unwrap_or_default()
    });

    let resp = engine.handle(request_with("GET", "/", &[("cookie", "name=ann")], Default::default()));
    let set: Vec<_> = resp.headers().get_all("set-cookie").iter().map(|v| v.to_str().unwrap().to_owned()).collect();
    assert_eq!(set[0], "seen=1; Path=/");
    let signed = set[1].strip_prefix("sid=").unwrap();
    assert_eq!(parse_secure_cookie("k", signed).as_deref(), Some("v"));
    assert_eq!(text(resp), "ann");
}

#[test]
fn hijack_needs_an_upgradable_connection() {
    let mut engine = Engine::classic();
    engine.get("/ws", |ctx: &mut Context| match ctx.hijack() {
        Err(Error::Upgrade) => "no upgrade",
        _ => "upgraded",
    });

    let resp = engine.handle(request("GET", "/ws"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp), "no upgrade");
}
