//! Controllers that branch on transport security.

use std::sync::Arc;

use crate::context::Context;

/// Per-request object with one entry point per transport. Both default
/// to 404, so a controller that only implements `https` hides itself from
/// plain HTTP.
pub trait ProtocolController: Send {
    fn http(&mut self, ctx: &mut Context) {
        ctx.not_found();
    }

    fn https(&mut self, ctx: &mut Context) {
        ctx.not_found();
    }
}

pub type ProtocolFactory = Arc<dyn Fn() -> Box<dyn ProtocolController> + Send + Sync>;

pub(crate) fn run(ctx: &mut Context, mut controller: Box<dyn ProtocolController>) {
    if ctx.is_secure() {
        controller.https(ctx);
    } else {
        controller.http(ctx);
    }
}
