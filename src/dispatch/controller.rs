//! Verb controllers.

use std::sync::Arc;

use axum::http::Method;

use crate::context::Context;
use crate::error::CaptureError;

/// Per-request object whose methods correspond to HTTP verbs and
/// lifecycle phases.
///
/// A fresh instance is built for every request, so fields may hold
/// request-scoped state. Verb methods default to 405, lifecycle hooks to
/// no-ops.
///
/// Call order: `bind`, `prepare`, then `ws` for websocket upgrades or `ajax`
/// for XHR GET/HEAD/POST, then the verb method, then always `finish`. Each
/// step after `bind` is skipped once the request is terminated, except
/// `finish`.
pub trait Controller: Send {
    /// Populate fields from captures and contextual data. An error is a 404.
    fn bind(&mut self, _ctx: &Context) -> Result<(), CaptureError> {
        Ok(())
    }

    fn prepare(&mut self, _ctx: &mut Context) {}

    fn ws(&mut self, _ctx: &mut Context) {}

    fn ajax(&mut self, _ctx: &mut Context) {}

    /// Serves GET and HEAD.
    fn get(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn post(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn put(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn patch(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn delete(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn options(&mut self, ctx: &mut Context) {
        ctx.method_not_allowed();
    }

    fn finish(&mut self, _ctx: &mut Context) {}
}

/// Builds one controller per request.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

pub(crate) fn run(ctx: &mut Context, mut controller: Box<dyn Controller>) {
    match controller.bind(ctx) {
        Ok(()) => serve(ctx, controller.as_mut()),
        Err(e) => {
            tracing::debug!(request_id = %ctx.request_id(), error = %e, "Controller bind failed");
            ctx.not_found();
        }
    }
    controller.finish(ctx);
}

fn serve(ctx: &mut Context, controller: &mut dyn Controller) {
    controller.prepare(ctx);
    if ctx.terminated() {
        return;
    }

    let method = ctx.method().clone();
    if ctx.is_websocket() {
        controller.ws(ctx);
    } else if ctx.is_ajax() && matches!(method, Method::GET | Method::HEAD | Method::POST) {
        controller.ajax(ctx);
    }
    if ctx.terminated() {
        return;
    }

    match method {
        Method::GET | Method::HEAD => controller.get(ctx),
        Method::POST => controller.post(ctx),
        Method::PUT => controller.put(ctx),
        Method::PATCH => controller.patch(ctx),
        Method::DELETE => controller.delete(ctx),
        Method::OPTIONS => controller.options(ctx),
        other => {
            tracing::debug!(request_id = %ctx.request_id(), method = %other, "No controller method for verb");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::AppConfig;
    use crate::context::Request;
    use crate::dispatch::dispatch;
    use crate::routing::Handler;
    use axum::http::StatusCode;
    use parking_lot::Mutex;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    struct Recorder {
        calls: Calls,
        stop_in_prepare: bool,
        id: i64,
    }

    impl Controller for Recorder {
        fn bind(&mut self, ctx: &Context) -> Result<(), CaptureError> {
            self.calls.lock().push("bind");
            if ctx.captures().contains("id") {
                self.id = ctx.captures().get_int("id")?;
            }
            Ok(())
        }

        fn prepare(&mut self, ctx: &mut Context) {
            self.calls.lock().push("prepare");
            if self.stop_in_prepare {
                ctx.forbidden();
            }
        }

        fn ws(&mut self, _ctx: &mut Context) {
            self.calls.lock().push("ws");
        }

        fn ajax(&mut self, _ctx: &mut Context) {
            self.calls.lock().push("ajax");
        }

        fn get(&mut self, ctx: &mut Context) {
            self.calls.lock().push("get");
            ctx.write(format!("id={}", self.id));
        }

        fn finish(&mut self, _ctx: &mut Context) {
            self.calls.lock().push("finish");
        }
    }

    fn handler(calls: &Calls, stop_in_prepare: bool) -> Handler {
        let calls = calls.clone();
        Handler::controller_with(move || Recorder {
            calls: calls.clone(),
            stop_in_prepare,
            id: 0,
        })
    }

    fn run_request(request: Request, handler: &Handler) -> Context {
        let mut ctx = Context::new(App::new(AppConfig::default()), request);
        ctx.captures_mut().set("id", "7");
        dispatch(&mut ctx, handler);
        ctx
    }

    #[test]
    fn test_lifecycle_order() {
        let calls = Calls::default();
        let ctx = run_request(Request::get("/"), &handler(&calls, false));

        assert_eq!(*calls.lock(), ["bind", "prepare", "get", "finish"]);
        assert_eq!(ctx.response().text(), "id=7");
    }

    #[test]
    fn test_ajax_only_for_safe_verbs_and_post() {
        let calls = Calls::default();
        let request = Request::get("/").with_header("X-Requested-With", "XMLHttpRequest");
        run_request(request, &handler(&calls, false));
        assert_eq!(*calls.lock(), ["bind", "prepare", "ajax", "get", "finish"]);

        let calls = Calls::default();
        let request = Request::new(Method::PUT, "/")
            .with_header("X-Requested-With", "XMLHttpRequest");
        let ctx = run_request(request, &handler(&calls, false));
        assert_eq!(*calls.lock(), ["bind", "prepare", "finish"]);
        assert_eq!(ctx.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_websocket_takes_precedence() {
        let calls = Calls::default();
        let request = Request::get("/")
            .with_header("Connection", "Upgrade")
            .with_header("Upgrade", "websocket")
            .with_header("X-Requested-With", "XMLHttpRequest");
        run_request(request, &handler(&calls, false));
        assert_eq!(*calls.lock(), ["bind", "prepare", "ws", "get", "finish"]);
    }

    #[test]
    fn test_finish_runs_after_termination() {
        let calls = Calls::default();
        let ctx = run_request(Request::get("/"), &handler(&calls, true));
        assert_eq!(*calls.lock(), ["bind", "prepare", "finish"]);
        assert_eq!(ctx.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_bind_failure_is_not_found() {
        let calls = Calls::default();
        let mut ctx = Context::new(App::new(AppConfig::default()), Request::get("/"));
        ctx.captures_mut().set("id", "seven");
        dispatch(&mut ctx, &handler(&calls, false));

        assert_eq!(*calls.lock(), ["bind", "finish"]);
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_verb_calls_nothing() {
        let calls = Calls::default();
        let method = Method::from_bytes(b"PURGE").unwrap();
        let ctx = run_request(Request::new(method, "/"), &handler(&calls, false));
        assert_eq!(*calls.lock(), ["bind", "prepare", "finish"]);
        assert!(!ctx.terminated());
    }

    #[test]
    fn test_fresh_instance_per_request() {
        #[derive(Default)]
        struct Counter {
            hits: u32,
        }
        impl Controller for Counter {
            fn get(&mut self, ctx: &mut Context) {
                self.hits += 1;
                ctx.write(self.hits.to_string());
            }
        }

        let handler = Handler::controller::<Counter>();
        for _ in 0..3 {
            let ctx = run_request(Request::get("/"), &handler);
            assert_eq!(ctx.response().text(), "1");
        }
    }
}
