mod common;

use http::StatusCode;
use rondo::{Action, Context, Engine, Error, Method, Methods, Reply, Request};

use common::{request, text};

#[test]
fn unknown_path_is_404() {
    let mut engine = Engine::classic();
    engine.get("/", || "root");

    let resp = engine.handle(request("GET", "/missing"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(resp), "404 Not Found");
}

#[test]
fn bare_engine_answers_misses_through_error_handler() {
    let engine = Engine::new();
    let resp = engine.handle(request("GET", "/"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(resp), "404 Not Found");
}

#[test]
fn wrong_method_does_not_match() {
    let mut engine = Engine::classic();
    engine.post("/users", || "created");

    assert_eq!(engine.handle(request("GET", "/users")).status(), StatusCode::NOT_FOUND);
    assert_eq!(engine.handle(request("POST", "/users")).status(), StatusCode::OK);
}

#[test]
fn get_also_answers_head() {
    let mut engine = Engine::classic();
    engine.get("/", || "root");
    assert_eq!(engine.handle(request("HEAD", "/")).status(), StatusCode::OK);
}

#[test]
fn any_answers_every_method() {
    let mut engine = Engine::classic();
    engine.any("/echo", |req: &Request| req.method().to_string());

    for method in ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"] {
        assert_eq!(text(engine.handle(request(method, "/echo"))), method);
    }
}

#[test]
fn trailing_slash_is_ignored() {
    let mut engine = Engine::classic();
    engine.get("/docs/", || "docs");

    assert_eq!(text(engine.handle(request("GET", "/docs"))), "docs");
    assert_eq!(text(engine.handle(request("GET", "/docs/"))), "docs");
}

#[test]
fn exact_route_wins_over_earlier_pattern() {
    let mut engine = Engine::classic();
    engine
        .get("/users/:id", |ctx: &mut Context| ctx.params().get(":id").to_owned())
        .get("/users/me", || "me");

    assert_eq!(text(engine.handle(request("GET", "/users/me"))), "me");
    assert_eq!(text(engine.handle(request("GET", "/users/7"))), "7");
}

#[test]
fn regex_groups_are_captured_in_order() {
    let mut engine = Engine::classic();
    engine.get("/files/(:dir [a-z]+)/([0-9]+)", |ctx: &mut Context| {
        let p = ctx.params();
        format!("{}:{}", p.get(":dir"), p.get("*0"))
    });

    assert_eq!(text(engine.handle(request("GET", "/files/img/42"))), "img:42");
    assert_eq!(engine.handle(request("GET", "/files/IMG/42")).status(), StatusCode::NOT_FOUND);
}

#[test]
fn star_matches_the_rest_of_the_path() {
    let mut engine = Engine::classic();
    engine.get("/static/*", |req: &Request| req.path().to_owned());
    assert_eq!(text(engine.handle(request("GET", "/static/css/site.css"))), "/static/css/site.css");
}

#[test]
fn invalid_pattern_is_a_registration_error() {
    let mut engine = Engine::new();
    let err = engine.try_route(&[Method::Get], "/(broken", || "x").err();
    assert!(matches!(err, Some(Error::InvalidPattern { .. })));
}

#[test]
#[should_panic(expected = "invalid route")]
fn route_panics_on_invalid_pattern() {
    Engine::new().get("/(broken", || "x");
}

#[derive(Default)]
struct PostOnly;

impl Action for PostOnly {
    fn methods(m: &mut Methods<Self>) {
        m.post(|_: &mut Self| "posted");
    }
}

#[test]
fn action_answering_no_requested_verb_is_rejected() {
    let mut engine = Engine::new();
    let err = engine.try_route(&[Method::Get], "/", PostOnly).err();
    assert!(matches!(err, Some(Error::UnsupportedHandler { .. })));
}

#[test]
fn custom_error_handler_sees_the_miss() {
    let mut engine = Engine::new();
    engine.error_handler(|ctx: &mut Context| {
        let code = match ctx.take_result() {
            Some(Reply::Abort(a)) => a.code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ctx.write_header(code);
        ctx.write_str("custom");
    });

    let resp = engine.handle(request("GET", "/nowhere"));
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(resp), "custom");
}

#[test]
fn handler_errors_become_500() {
    let mut engine = Engine::classic();
    engine.get("/", || -> Result<String, std::io::Error> { Err(std::io::Error::other("disk on fire")) });

    let resp = engine.handle(request("GET", "/"));
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(resp), "disk on fire");
}

#[test]
fn returning_nothing_is_an_empty_200() {
    let mut engine = Engine::classic();
    engine.delete("/item", || ());

    let resp = engine.handle(request("DELETE", "/item"));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp), "");
}

#[test]
fn encoded_parameters_are_decoded() {
    let mut engine = Engine::classic();
    engine
        .get("/:name", |ctx: &mut Context| ctx.params().get(":name").to_owned())
        .get("/menu/café", || "exact");

    assert_eq!(text(engine.handle(request("GET", "/foo%20bar"))), "foo bar");
    assert_eq!(text(engine.handle(request("GET", "/menu/caf%C3%A9"))), "exact");
}

#[test]
fn repeated_parameter_names_return_the_first() {
    let mut engine = Engine::classic();
    engine
        .try_route(&[Method::Get], "/:id/:id", |ctx: &mut Context| ctx.params().get(":id").to_owned())
        .unwrap();

    assert_eq!(text(engine.handle(request("GET", "/1/2"))), "1");
}

#[test]
fn duplicate_exact_route_keeps_the_first() {
    let mut engine = Engine::classic();
    engine.get("/dup", || "first").get("/dup", || "second");

    assert_eq!(text(engine.handle(request("GET", "/dup"))), "first");
}
