//! Minimal rondo app: a string route, a JSON struct action and a group.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8000/
//!   curl http://localhost:8000/users/42
//!   curl -H 'accept-encoding: gzip' http://localhost:8000/api/v1/ping --output -

use rondo::{Action, Engine, Methods, Params, Render, forbidden};
use serde_json::json;

#[derive(Default)]
struct User {
    params: Params,
}

impl User {
    fn get(&mut self) -> serde_json::Value {
        json!({ "id": self.params.get(":id"), "name": "alice" })
    }
}

impl Action for User {
    fn methods(m: &mut Methods<Self>) {
        m.get(Self::get)
            .inject(|u: &mut Self, p: Params| u.params = p)
            .render(Render::Json);
    }
}

#[tokio::main]
async fn main() -> Result<(), rondo::Error> {
    tracing_subscriber::fmt::init();

    let mut engine = Engine::classic();
    engine
        .get("/", || "hello from rondo")
        .get("/users/:id", User::default())
        .delete("/users/:id", || forbidden())
        .group("/api", |g| g.group("/v1", |g| g.get("/ping", || "pong")));

    engine.run(None).await
}
