//! End-to-end tests through the HTTP transport.

use std::sync::Arc;

use axum::http::StatusCode;
use parking_lot::Mutex;
use serde_json::json;

use switchyard::app::{App, MAIN};
use switchyard::config::{AppConfig, SessionStoreKind};
use switchyard::context::Context;
use switchyard::dispatch::Controller;
use switchyard::error::CaptureError;
use switchyard::middleware::Middleware;
use switchyard::routing::{DirRouter, Handler, HostRouter, RegexRouter};
use switchyard::session::SessionMap;

mod common;

#[derive(Default)]
struct Item {
    id: i64,
}

impl Controller for Item {
    fn bind(&mut self, ctx: &Context) -> Result<(), CaptureError> {
        self.id = ctx.captures().get_int("id")?;
        Ok(())
    }

    fn get(&mut self, ctx: &mut Context) {
        ctx.write(format!("item {}", self.id));
    }

    fn delete(&mut self, ctx: &mut Context) {
        ctx.write(format!("deleted {}", self.id));
    }
}

fn session_app(store: SessionStoreKind) -> Arc<App> {
    let mut config = AppConfig::default();
    config.session.store = store;
    if store == SessionStoreKind::File {
        config.session.file_path = std::env::temp_dir()
            .join(format!("switchyard-it-{}", switchyard::session::generate_key()))
            .to_string_lossy()
            .into_owned();
    }

    let app = App::new(config);
    app.router(MAIN)
        .register_fn("^/login/(?P<user>[a-z]+)$", |ctx: &mut Context| {
            let user = ctx.captures().get("user").unwrap_or_default().to_string();
            let mut session = SessionMap::load(ctx);
            session.set("user", user);
            match session.save(ctx) {
                Ok(()) => ctx.write("ok"),
                Err(_) => ctx.internal_error(),
            }
        })
        .unwrap()
        .register_fn("^/whoami$", |ctx: &mut Context| {
            let user = SessionMap::load(ctx)
                .get("user")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "anonymous".to_string());
            ctx.write(user);
        })
        .unwrap()
        .register_fn("^/logout$", |ctx: &mut Context| {
            match ctx.destroy_session() {
                Ok(()) => ctx.write("bye"),
                Err(_) => ctx.internal_error(),
            }
        })
        .unwrap();
    app
}

async fn session_round_trip(store: SessionStoreKind) {
    let server = common::spawn_server(session_app(store)).await;
    let client = common::client();

    let get = |path: &str| client.get(server.url(path)).send();

    assert_eq!(get("/whoami").await.unwrap().text().await.unwrap(), "anonymous");
    assert_eq!(get("/login/alice").await.unwrap().text().await.unwrap(), "ok");
    assert_eq!(get("/whoami").await.unwrap().text().await.unwrap(), "alice");
    assert_eq!(get("/logout").await.unwrap().text().await.unwrap(), "bye");
    assert_eq!(get("/whoami").await.unwrap().text().await.unwrap(), "anonymous");
}

#[tokio::test]
async fn test_memory_session_round_trip() {
    session_round_trip(SessionStoreKind::Memory).await;
}

#[tokio::test]
async fn test_file_session_round_trip() {
    session_round_trip(SessionStoreKind::File).await;
}

#[tokio::test]
async fn test_cookie_session_round_trip() {
    session_round_trip(SessionStoreKind::Cookie).await;
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let server = common::spawn_server(session_app(SessionStoreKind::Memory)).await;
    let response = reqwest::get(server.url("/login/bob")).await.unwrap();

    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("__session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn test_controllers_and_not_found() {
    let app = App::new(AppConfig::default());
    let items = DirRouter::new();
    items.pattern(r"^(?P<id>-?\d+)$").unwrap().asterisk(Handler::controller::<Item>());
    app.router(MAIN).register("^/items", items).unwrap();

    let server = common::spawn_server(app).await;
    let client = common::client();

    let response = client.get(server.url("/items/42")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "item 42");

    let response = client.delete(server.url("/items/7")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "deleted 7");

    let response = client.put(server.url("/items/7")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = client.get(server.url("/items/abc")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(server.url("/items/7/extra")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(server.url("/elsewhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_host_routing() {
    let app = App::new(AppConfig::default());

    let api = RegexRouter::new();
    api.register_fn("^/$", |ctx: &mut Context| ctx.write("api")).unwrap();
    let www = RegexRouter::new();
    www.register_fn("^/$", |ctx: &mut Context| ctx.write("www")).unwrap();

    let hosts = HostRouter::new();
    hosts.register("api.test", api).register("www.test", www);
    app.set_default_router(hosts);

    let server = common::spawn_server(app).await;
    let client = common::client();

    for (host, expected) in [("api.test", "api"), ("WWW.test:8080", "www")] {
        let response = client
            .get(server.url("/"))
            .header("host", host)
            .send()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), expected);
    }

    let response = client
        .get(server.url("/"))
        .header("host", "other.test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_middleware_wraps_request() {
    type Log = Arc<Mutex<Vec<String>>>;

    struct Tag {
        name: &'static str,
        priority: i32,
        log: Log,
    }

    impl Middleware for Tag {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn pre(&mut self, ctx: &mut Context) {
            self.log.lock().push(format!("pre:{}", self.name));
            ctx.set_data(self.name, json!(true));
        }

        fn post(&mut self, _ctx: &mut Context) {
            self.log.lock().push(format!("post:{}", self.name));
        }
    }

    let log = Log::default();
    let app = App::new(AppConfig::default());
    for (name, priority, list) in [("outer", 1, MAIN), ("inner", 1, "app")] {
        let log = log.clone();
        app.middlewares(list).register_with(name, priority, move || Tag {
            name,
            priority,
            log: log.clone(),
        });
    }
    let handler_log = log.clone();
    app.router(MAIN)
        .register_fn("^/$", move |ctx: &mut Context| {
            handler_log.lock().push("handler".to_string());
            let seen = ctx.data().contains_key("outer") && ctx.data().contains_key("inner");
            ctx.write(seen.to_string());
        })
        .unwrap();

    let server = common::spawn_server(app).await;
    let body = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();

    assert_eq!(body, "true");
    assert_eq!(
        *log.lock(),
        ["pre:outer", "pre:inner", "handler", "post:inner", "post:outer"]
    );
}

#[tokio::test]
async fn test_handler_panic_is_500() {
    let app = App::new(AppConfig::default());
    app.router(MAIN)
        .register_fn("^/boom$", |_: &mut Context| panic!("boom"))
        .unwrap()
        .register_fn("^/ok$", |ctx: &mut Context| ctx.write("still serving"))
        .unwrap();

    let server = common::spawn_server(app).await;

    let response = reqwest::get(server.url("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = reqwest::get(server.url("/ok")).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "still serving");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = App::new(AppConfig::default());
    app.router(MAIN)
        .register_fn("^/$", |ctx: &mut Context| {
            let id = ctx.request_id().to_string();
            ctx.write(id);
        })
        .unwrap();

    let server = common::spawn_server(app).await;
    let response = common::client()
        .get(server.url("/"))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.text().await.unwrap(), "req-123");
}
