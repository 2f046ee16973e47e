//! Switchyard: request routing and dispatch for web applications.
//!
//! Path and host routers resolve each request to a handler, a priority
//! ordered middleware pipeline wraps the handling, and pluggable session
//! stores carry per-client state between requests.

pub mod app;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod routing;
pub mod session;

pub use app::App;
pub use config::AppConfig;
pub use context::{Context, Request, Response};
pub use dispatch::{Controller, ProtocolController};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use middleware::Middleware;
pub use routing::Handler;
