//! Access log middleware.

use std::time::Instant;

use crate::context::Context;
use crate::middleware::Middleware;

/// Logs one line per request with its status and latency.
///
/// Registered with the lowest priority so it brackets every other hook.
#[derive(Debug, Default)]
pub struct AccessLog {
    started: Option<Instant>,
}

impl Middleware for AccessLog {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn pre(&mut self, ctx: &mut Context) {
        self.started = Some(Instant::now());
        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            host = %ctx.host(),
            path = %ctx.path(),
            "Request started"
        );
    }

    fn post(&mut self, ctx: &mut Context) {
        let elapsed_ms = self
            .started
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = ctx.status().as_u16(),
            elapsed_ms,
            "Request completed"
        );
    }
}
