//! Middleware pipeline.
//!
//! # Data Flow
//! ```text
//! setup:    Middlewares::register (sorted by priority, stable)
//! request:  Middlewares::init → MiddlewareChain
//!           Idle → PreRunning → Ready | Terminated → PostRunning → Done
//! ```
//!
//! # Design Decisions
//! - One fresh instance per registered type per request, so hooks can keep
//!   state between `pre` and `post`
//! - `post` mirrors exactly the `pre` hooks that ran, newest first
//! - Panics are not caught here beyond guaranteeing `post`; recovery
//!   belongs to the request boundary

pub mod logging;
pub mod pipeline;

pub use logging::AccessLog;
pub use pipeline::{MiddlewareChain, Middlewares, PipelineState};

use crate::context::Context;

/// Priority used when a middleware does not pick one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// A pair of hooks around request handling.
pub trait Middleware: Send {
    /// Lower runs earlier in `pre` and later in `post`.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Runs before dispatch. Terminating the context stops the chain.
    fn pre(&mut self, _ctx: &mut Context) {}

    /// Runs after dispatch, even when the request was terminated early.
    fn post(&mut self, _ctx: &mut Context) {}
}
