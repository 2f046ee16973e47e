//! Ordered-regex path router.
//!
//! # Responsibilities
//! - Match the whole remaining path against each rule, in pattern order
//! - Copy named groups into the request captures
//! - Advance the path cursor past the match and hand off to the handler
//!
//! # Design Decisions
//! - Rules are ordered by pattern string, never by registration order
//! - Patterns are tested against the entire remaining path, so a capture
//!   group may span several segments
//! - Unanchored patterns are allowed; the cursor advances past the end of
//!   the match

use parking_lot::RwLock;

use crate::context::Context;
use crate::dispatch::dispatch;
use crate::error::RouteError;
use crate::routing::pattern::PatternTable;
use crate::routing::Handler;

/// Path router over regex rules.
#[derive(Default)]
pub struct RegexRouter {
    table: PatternTable,
    asterisk: RwLock<Option<Handler>>,
}

impl RegexRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one rule. A rule with the same pattern is replaced.
    pub fn register(
        &self,
        pattern: &str,
        handler: impl Into<Handler>,
    ) -> Result<&Self, RouteError> {
        self.table.register(pattern, handler.into())?;
        Ok(self)
    }

    pub fn register_fn<F>(&self, pattern: &str, f: F) -> Result<&Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(pattern, Handler::func(f))
    }

    /// Register a batch. Nothing is registered if any pattern is invalid.
    pub fn register_all<I, K, H>(&self, rules: I) -> Result<&Self, RouteError>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        self.table.register_all(rules)?;
        Ok(self)
    }

    /// Handler used when no rule matches.
    pub fn asterisk(&self, handler: impl Into<Handler>) -> &Self {
        *self.asterisk.write() = Some(handler.into());
        self
    }

    pub fn patterns(&self) -> Vec<String> {
        self.table.patterns()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try every rule. Returns false, leaving the context untouched, when
    /// none matches.
    pub fn load(&self, ctx: &mut Context) -> bool {
        let path = ctx.remaining_path().to_string();

        for entry in self.table.snapshot() {
            let Some(caps) = entry.regex.captures(&path) else {
                continue;
            };
            let Some(whole) = caps.get(0) else {
                continue;
            };

            tracing::trace!(
                request_id = %ctx.request_id(),
                pattern = %entry.pattern,
                "Path rule matched"
            );
            ctx.captures_mut().record(&entry.regex, &caps);
            ctx.consume_match(whole.end());
            dispatch(ctx, &entry.handler);
            return true;
        }
        false
    }

    /// Route the request, falling back to the asterisk handler and then to
    /// a 404. Websocket upgrades that miss are left unanswered.
    pub fn view(&self, ctx: &mut Context) {
        if self.load(ctx) {
            return;
        }

        let asterisk = self.asterisk.read().clone();
        if let Some(handler) = asterisk {
            dispatch(ctx, &handler);
            return;
        }

        if ctx.is_websocket() {
            tracing::debug!(request_id = %ctx.request_id(), path = %ctx.path(), "No route for websocket upgrade");
            return;
        }
        ctx.not_found_listing("Registered rules", self.patterns());
    }

    /// Rewind the path cursor, then route.
    pub fn view_reset(&self, ctx: &mut Context) {
        ctx.reset_path();
        self.view(ctx);
    }
}
