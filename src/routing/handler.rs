//! Handler shapes a router can hold.
//!
//! # Design Decisions
//! - A closed enum instead of runtime type inspection: every shape the
//!   dispatcher knows is a variant, and `Custom` is the escape hatch for
//!   anything else (served through the app's asserters)
//! - Routers are held behind `Arc` so one router can be mounted in many
//!   places and shared with the app registries

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::dispatch::{Controller, ControllerFactory, ProtocolController, ProtocolFactory};
use crate::routing::{BinRouter, DirRouter, HostPatternRouter, HostRouter, RegexRouter};

/// Plain function handler.
pub type HandlerFn = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Upcast helper so asserters can recognise concrete view types.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A handler shape the dispatcher does not know natively.
pub trait View: AsAny + Send + Sync {
    fn view(&self, ctx: &mut Context);
}

/// Everything that can be registered under a route.
#[derive(Clone)]
pub enum Handler {
    Func(HandlerFn),
    Controller(ControllerFactory),
    Protocol(ProtocolFactory),
    Router(Arc<RegexRouter>),
    /// Regex router that rewinds the path cursor before matching.
    Reset(Arc<RegexRouter>),
    Dir(Arc<DirRouter>),
    Bin(Arc<BinRouter>),
    Host(Arc<HostRouter>),
    HostPattern(Arc<HostPatternRouter>),
    /// Rejects with 404 unless nothing but an optional `/` remains.
    Locked(Arc<Handler>),
    /// Exempts a leaf from the segment routers' automatic lock.
    Unlocked(Arc<Handler>),
    Custom(Arc<dyn View>),
}

impl Handler {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        Handler::Func(Arc::new(f))
    }

    /// Verb controller built fresh for every request with `C::default()`.
    pub fn controller<C>() -> Self
    where
        C: Controller + Default + 'static,
    {
        Self::controller_with(C::default)
    }

    /// Verb controller built fresh for every request by `factory`.
    pub fn controller_with<C, F>(factory: F) -> Self
    where
        C: Controller + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Handler::Controller(Arc::new(move || Box::new(factory()) as Box<dyn Controller>))
    }

    pub fn protocol<P>() -> Self
    where
        P: ProtocolController + Default + 'static,
    {
        Self::protocol_with(P::default)
    }

    pub fn protocol_with<P, F>(factory: F) -> Self
    where
        P: ProtocolController + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Handler::Protocol(Arc::new(move || {
            Box::new(factory()) as Box<dyn ProtocolController>
        }))
    }

    pub fn custom<V: View + 'static>(view: V) -> Self {
        Handler::Custom(Arc::new(view))
    }

    pub fn locked(inner: impl Into<Handler>) -> Self {
        Handler::Locked(Arc::new(inner.into()))
    }

    pub fn unlocked(inner: impl Into<Handler>) -> Self {
        Handler::Unlocked(Arc::new(inner.into()))
    }

    /// Mount `router` so that it matches against the full request path.
    pub fn reset(router: impl Into<Arc<RegexRouter>>) -> Self {
        Handler::Reset(router.into())
    }

    /// Short name of the variant, used in logs and debug listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Func(_) => "func",
            Handler::Controller(_) => "controller",
            Handler::Protocol(_) => "protocol",
            Handler::Router(_) => "router",
            Handler::Reset(_) => "reset",
            Handler::Dir(_) => "dir",
            Handler::Bin(_) => "bin",
            Handler::Host(_) => "host",
            Handler::HostPattern(_) => "host_pattern",
            Handler::Locked(_) => "locked",
            Handler::Unlocked(_) => "unlocked",
            Handler::Custom(_) => "custom",
        }
    }

    /// Wrap a leaf in `Locked`. Routers and already-wrapped handlers pass
    /// through untouched.
    pub(crate) fn lock_leaf(self) -> Handler {
        match self {
            Handler::Func(_)
            | Handler::Controller(_)
            | Handler::Protocol(_)
            | Handler::Custom(_) => Handler::Locked(Arc::new(self)),
            other => other,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Locked(inner) => f.debug_tuple("Locked").field(inner).finish(),
            Handler::Unlocked(inner) => f.debug_tuple("Unlocked").field(inner).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

macro_rules! router_into_handler {
    ($router:ty => $variant:ident) => {
        impl From<Arc<$router>> for Handler {
            fn from(router: Arc<$router>) -> Self {
                Handler::$variant(router)
            }
        }

        impl From<$router> for Handler {
            fn from(router: $router) -> Self {
                Handler::$variant(Arc::new(router))
            }
        }
    };
}

router_into_handler!(RegexRouter => Router);
router_into_handler!(DirRouter => Dir);
router_into_handler!(BinRouter => Bin);
router_into_handler!(HostRouter => Host);
router_into_handler!(HostPatternRouter => HostPattern);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_leaf_wraps_only_leaves() {
        assert_eq!(Handler::func(|_| {}).lock_leaf().kind(), "locked");
        assert_eq!(Handler::from(RegexRouter::new()).lock_leaf().kind(), "router");
        assert_eq!(Handler::from(DirRouter::new()).lock_leaf().kind(), "dir");
        assert_eq!(
            Handler::unlocked(Handler::func(|_| {})).lock_leaf().kind(),
            "unlocked"
        );
    }

    #[test]
    fn test_custom_view_downcasts() {
        struct Page(&'static str);
        impl View for Page {
            fn view(&self, ctx: &mut Context) {
                ctx.write(self.0);
            }
        }

        let handler = Handler::custom(Page("hi"));
        let Handler::Custom(view) = handler else {
            panic!("expected custom handler");
        };
        let view: &dyn View = &*view;
        assert_eq!(view.as_any().downcast_ref::<Page>().map(|p| p.0), Some("hi"));
    }
}
