//! Handler dispatch.
//!
//! # Responsibilities
//! - Invoke a matched `Handler` with the protocol its shape requires
//! - Recurse into sub-routers
//! - Enforce path locks
//! - Give registered asserters first refusal on custom views
//!
//! # Design Decisions
//! - Shapes are enum variants, so controllers can never be mistaken for
//!   routers
//! - Controllers are built per request from a factory registered once
//! - Dispatch is a no-op once the request is terminated

pub mod asserter;
pub mod controller;
pub mod protocol;

pub use asserter::RouteAsserter;
pub use controller::{Controller, ControllerFactory};
pub use protocol::{ProtocolController, ProtocolFactory};

use crate::context::Context;
use crate::routing::Handler;

/// Invoke `handler` for the request in `ctx`.
pub fn dispatch(ctx: &mut Context, handler: &Handler) {
    if ctx.terminated() {
        tracing::trace!(request_id = %ctx.request_id(), handler = handler.kind(), "Skipping dispatch, request terminated");
        return;
    }

    match handler {
        Handler::Func(f) => f(ctx),
        Handler::Controller(factory) => controller::run(ctx, factory()),
        Handler::Protocol(factory) => protocol::run(ctx, factory()),
        Handler::Router(router) => router.view(ctx),
        Handler::Reset(router) => router.view_reset(ctx),
        Handler::Dir(router) => router.view(ctx),
        Handler::Bin(router) => router.view(ctx),
        Handler::Host(router) => router.view(ctx),
        Handler::HostPattern(router) => router.view(ctx),
        Handler::Locked(inner) => {
            if ctx.at_root() {
                dispatch(ctx, inner);
            } else {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    remaining = %ctx.remaining_path(),
                    "Locked handler rejected trailing path"
                );
                ctx.not_found();
            }
        }
        Handler::Unlocked(inner) => dispatch(ctx, inner),
        Handler::Custom(view) => {
            let view: &dyn crate::routing::View = &**view;
            let asserters = ctx.app().asserters();
            for asserter in asserters {
                if asserter.assert(ctx, view) {
                    return;
                }
            }
            view.view(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::AppConfig;
    use crate::context::Request;
    use crate::routing::View;
    use axum::http::StatusCode;

    struct Template(&'static str);

    impl View for Template {
        fn view(&self, ctx: &mut Context) {
            ctx.write(format!("raw:{}", self.0));
        }
    }

    fn context(app: &std::sync::Arc<App>, path: &str) -> Context {
        Context::new(app.clone(), Request::get(path))
    }

    #[test]
    fn test_locked_and_unlocked() {
        let app = App::new(AppConfig::default());
        let leaf = || Handler::func(|ctx: &mut Context| ctx.write("leaf"));

        for path in ["", "/"] {
            let mut ctx = context(&app, path);
            dispatch(&mut ctx, &Handler::locked(leaf()));
            assert_eq!(ctx.response().text(), "leaf");
        }

        for path in ["/x", "/x/y/z"] {
            let mut ctx = context(&app, path);
            dispatch(&mut ctx, &Handler::locked(leaf()));
            assert_eq!(ctx.status(), StatusCode::NOT_FOUND, "path {path}");

            let mut ctx = context(&app, path);
            dispatch(&mut ctx, &Handler::unlocked(leaf()));
            assert_eq!(ctx.response().text(), "leaf");
            assert_eq!(ctx.remaining_path(), path);
        }
    }

    #[test]
    fn test_terminated_context_is_left_alone() {
        let app = App::new(AppConfig::default());
        let mut ctx = context(&app, "/");
        ctx.terminate();
        dispatch(&mut ctx, &Handler::func(|ctx: &mut Context| ctx.write("late")));
        assert!(ctx.response().body().is_empty());
    }

    #[test]
    fn test_asserter_claims_custom_view() {
        let app = App::new(AppConfig::default());
        app.add_asserter(|ctx: &mut Context, view: &dyn View| {
            match view.as_any().downcast_ref::<Template>() {
                Some(template) => {
                    ctx.write(format!("rendered:{}", template.0));
                    true
                }
                None => false,
            }
        });

        struct Other;
        impl View for Other {
            fn view(&self, ctx: &mut Context) {
                ctx.write("other");
            }
        }

        let mut ctx = context(&app, "/");
        dispatch(&mut ctx, &Handler::custom(Template("home")));
        assert_eq!(ctx.response().text(), "rendered:home");

        let mut ctx = context(&app, "/");
        dispatch(&mut ctx, &Handler::custom(Other));
        assert_eq!(ctx.response().text(), "other");
    }

    #[test]
    fn test_view_runs_without_asserters() {
        let app = App::new(AppConfig::default());
        let mut ctx = context(&app, "/");
        dispatch(&mut ctx, &Handler::custom(Template("home")));
        assert_eq!(ctx.response().text(), "raw:home");
    }
}
