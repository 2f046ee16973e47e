//! The application: registries, defaults, and the per-request boundary.
//!
//! # Data Flow
//! ```text
//! App::serve(Request)
//!     → secure header check
//!     → Context::new
//!     → SessionStore::init
//!     → "main" middleware pre
//!     → default view ("app" middleware around the default router)
//!     → panic? report fault, 500
//!     → "main" middleware post
//!     → nothing written? report, 500
//!     → Response
//! ```
//!
//! # Design Decisions
//! - One `App` owns every registry; there is no global state
//! - Registries are get-or-create by name and safe to extend while serving
//! - Faults are caught once, here, for the whole request

pub mod errors;
pub mod fault;

pub use errors::{ErrorPage, ErrorPages};
pub use fault::{Fault, FaultReporter, FileReporter, LogReporter};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::config::AppConfig;
use crate::context::{Context, Request, Response};
use crate::dispatch::{dispatch, RouteAsserter};
use crate::middleware::Middlewares;
use crate::observability::metrics;
use crate::routing::{BinRouter, DirRouter, Handler, HostPatternRouter, HostRouter, RegexRouter};
use crate::session::{self, SessionStore};

/// Name of the middleware list wrapped around the whole request.
pub const MAIN: &str = "main";

/// Name of the middleware list wrapped around the default router.
pub const APP: &str = "app";

pub struct App {
    config: ArcSwap<AppConfig>,
    routers: DashMap<String, Arc<RegexRouter>>,
    dir_routers: DashMap<String, Arc<DirRouter>>,
    bin_routers: DashMap<String, Arc<BinRouter>>,
    hosts: DashMap<String, Arc<HostRouter>>,
    host_patterns: DashMap<String, Arc<HostPatternRouter>>,
    middlewares: DashMap<String, Arc<Middlewares>>,
    asserters: RwLock<Vec<Arc<dyn RouteAsserter>>>,
    default_router: RwLock<Option<Handler>>,
    default_view: RwLock<Option<Handler>>,
    error_pages: ErrorPages,
    fault_reporter: RwLock<Arc<dyn FaultReporter>>,
    session_store: RwLock<Arc<dyn SessionStore>>,
}

impl App {
    /// Create an app with a session store built from `config`. The memory
    /// store's sweeper is not tied to any shutdown signal; use
    /// `set_session_store` for that.
    pub fn new(config: AppConfig) -> Arc<Self> {
        let store = session::from_config(&config.session, None);
        Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            routers: DashMap::new(),
            dir_routers: DashMap::new(),
            bin_routers: DashMap::new(),
            hosts: DashMap::new(),
            host_patterns: DashMap::new(),
            middlewares: DashMap::new(),
            asserters: RwLock::new(Vec::new()),
            default_router: RwLock::new(None),
            default_view: RwLock::new(None),
            error_pages: ErrorPages::default(),
            fault_reporter: RwLock::new(Arc::new(LogReporter)),
            session_store: RwLock::new(store),
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// Swap in a new config. In-flight requests keep the snapshot they
    /// started with.
    pub fn reload_config(&self, config: AppConfig) {
        tracing::info!(name = %config.name, debug = config.debug, "Applying new configuration");
        self.config.store(Arc::new(config));
    }

    // ---- named registries ----------------------------------------------------

    pub fn router(&self, name: &str) -> Arc<RegexRouter> {
        self.routers.entry(name.to_string()).or_default().value().clone()
    }

    pub fn dir_router(&self, name: &str) -> Arc<DirRouter> {
        self.dir_routers.entry(name.to_string()).or_default().value().clone()
    }

    pub fn bin_router(&self, name: &str) -> Arc<BinRouter> {
        self.bin_routers.entry(name.to_string()).or_default().value().clone()
    }

    pub fn host_router(&self, name: &str) -> Arc<HostRouter> {
        self.hosts.entry(name.to_string()).or_default().value().clone()
    }

    pub fn host_pattern_router(&self, name: &str) -> Arc<HostPatternRouter> {
        self.host_patterns.entry(name.to_string()).or_default().value().clone()
    }

    pub fn middlewares(&self, name: &str) -> Arc<Middlewares> {
        self.middlewares.entry(name.to_string()).or_default().value().clone()
    }

    // ---- dispatch defaults ---------------------------------------------------

    pub fn add_asserter<A: RouteAsserter + 'static>(&self, asserter: A) {
        self.asserters.write().push(Arc::new(asserter));
    }

    pub fn asserters(&self) -> Vec<Arc<dyn RouteAsserter>> {
        self.asserters.read().clone()
    }

    /// Handler the default view routes through. Defaults to the regex
    /// router named `"main"`.
    pub fn default_router(&self) -> Handler {
        self.default_router
            .read()
            .clone()
            .unwrap_or_else(|| Handler::Router(self.router(MAIN)))
    }

    pub fn set_default_router(&self, handler: impl Into<Handler>) {
        *self.default_router.write() = Some(handler.into());
    }

    /// Replace the default view entirely. The `"app"` middleware list is
    /// then only run if the new view runs it.
    pub fn set_default_view(&self, handler: impl Into<Handler>) {
        *self.default_view.write() = Some(handler.into());
    }

    /// The default view: `"app"` middleware wrapped around the default
    /// router, unless replaced.
    pub fn view(&self, ctx: &mut Context) {
        let custom = self.default_view.read().clone();
        if let Some(handler) = custom {
            dispatch(ctx, &handler);
            return;
        }

        let router = self.default_router();
        let enabled = self.config().middleware.enabled;
        self.middlewares(APP)
            .init(enabled)
            .wrap(ctx, |ctx| dispatch(ctx, &router));
    }

    // ---- collaborators -------------------------------------------------------

    pub fn error_pages(&self) -> &ErrorPages {
        &self.error_pages
    }

    pub fn fault_reporter(&self) -> Arc<dyn FaultReporter> {
        self.fault_reporter.read().clone()
    }

    pub fn set_fault_reporter<R: FaultReporter + 'static>(&self, reporter: R) {
        *self.fault_reporter.write() = Arc::new(reporter);
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.session_store.read().clone()
    }

    pub fn set_session_store(&self, store: Arc<dyn SessionStore>) {
        *self.session_store.write() = store;
    }

    // ---- request boundary ----------------------------------------------------

    /// Handle one request from start to finish. Never panics because of a
    /// handler.
    pub fn serve(self: &Arc<Self>, mut request: Request) -> Response {
        let started = Instant::now();
        let config = self.config();

        if request.take_header(&config.server.secure_header) {
            request.set_secure(true);
        }
        let method = request.method().clone();
        let mut ctx = Context::new(self.clone(), request);

        if let Err(e) = self.session_store().init(&mut ctx) {
            tracing::warn!(request_id = %ctx.request_id(), error = %e, "Session init failed");
        }

        let mut chain = self.middlewares(MAIN).init(config.middleware.enabled);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            chain.pre(&mut ctx);
            if !ctx.terminated() {
                self.view(&mut ctx);
            }
        }));
        if let Err(payload) = outcome {
            self.fault(&mut ctx, "dispatch", payload);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| chain.post(&mut ctx)));
        if let Err(payload) = outcome {
            self.fault(&mut ctx, "post", payload);
        }

        if !ctx.response().started() && method != Method::HEAD {
            self.no_output(&mut ctx, config.debug);
        }

        let response = ctx.into_response();
        metrics::record_request(method.as_str(), response.status().as_u16(), started);
        response
    }

    fn fault(&self, ctx: &mut Context, phase: &'static str, payload: Box<dyn Any + Send>) {
        let message = fault::panic_message(payload.as_ref());
        self.report(ctx, phase, message);
    }

    fn no_output(&self, ctx: &mut Context, debug: bool) {
        if debug {
            self.report(ctx, "no_output", "request finished without writing a response");
            return;
        }
        tracing::warn!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            "Request produced no output"
        );
        ctx.discard_body();
        ctx.internal_error();
    }

    /// Report a fault and replace whatever was written with a 500.
    fn report(&self, ctx: &mut Context, phase: &'static str, message: impl Into<String>) {
        let fault = Fault::new(ctx, phase, message);
        metrics::record_fault(phase);
        self.fault_reporter().report(&fault);

        ctx.discard_body();
        if !ctx.config().debug {
            ctx.internal_error();
            return;
        }

        ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        ctx.response_headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        ctx.write(format!("500 Internal Server Error\r\n\r\n{fault}\r\n"));
    }
}
