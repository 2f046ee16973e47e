//! Extension point for handler shapes the dispatcher does not know.

use crate::context::Context;
use crate::routing::View;

/// Gets first refusal on every `Handler::Custom`. Returning true means the
/// asserter served the request and the view's own `view` is skipped.
pub trait RouteAsserter: Send + Sync {
    fn assert(&self, ctx: &mut Context, view: &dyn View) -> bool;
}

impl<F> RouteAsserter for F
where
    F: Fn(&mut Context, &dyn View) -> bool + Send + Sync,
{
    fn assert(&self, ctx: &mut Context, view: &dyn View) -> bool {
        self(ctx, view)
    }
}
