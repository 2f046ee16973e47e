//! Template registries and per-request chains.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::Context;
use crate::middleware::Middleware;

type MiddlewareFactory = Arc<dyn Fn() -> Box<dyn Middleware> + Send + Sync>;

#[derive(Clone)]
struct Descriptor {
    name: &'static str,
    priority: i32,
    factory: MiddlewareFactory,
}

/// Template pipeline: the registered middleware types in priority order.
///
/// Lower priorities run first in `pre` and last in `post`. Equal
/// priorities keep registration order.
#[derive(Default)]
pub struct Middlewares {
    descriptors: RwLock<Vec<Descriptor>>,
}

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M`, built with `M::default()` for every request.
    pub fn register<M>(&self) -> &Self
    where
        M: Middleware + Default + 'static,
    {
        let priority = M::default().priority();
        self.register_with(std::any::type_name::<M>(), priority, M::default)
    }

    /// Register a middleware built by `factory` for every request.
    pub fn register_with<M, F>(&self, name: &'static str, priority: i32, factory: F) -> &Self
    where
        M: Middleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let descriptor = Descriptor {
            name,
            priority,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Middleware>),
        };

        let mut descriptors = self.descriptors.write();
        descriptors.push(descriptor);
        descriptors.sort_by_key(|d| d.priority);
        tracing::debug!(middleware = name, priority, "Middleware registered");
        self
    }

    /// Registered names, in run order.
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.read().iter().map(|d| d.name).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.descriptors.write().clear();
    }

    /// Fresh chain for one request. A disabled pipeline yields an empty
    /// chain.
    pub fn init(&self, enabled: bool) -> MiddlewareChain {
        if !enabled {
            return MiddlewareChain::empty();
        }
        let items = self
            .descriptors
            .read()
            .iter()
            .map(|d| (d.factory)())
            .collect();
        MiddlewareChain::new(items)
    }
}

/// Where a chain is in its per-request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    PreRunning,
    /// Every `pre` ran without terminating the request.
    Ready,
    /// A `pre` terminated the request; later hooks were dropped.
    Terminated,
    PostRunning,
    Done,
}

/// Middleware instances bound to one request.
pub struct MiddlewareChain {
    items: Vec<Box<dyn Middleware>>,
    ran: usize,
    state: PipelineState,
}

impl MiddlewareChain {
    fn new(items: Vec<Box<dyn Middleware>>) -> Self {
        Self {
            items,
            ran: 0,
            state: PipelineState::Idle,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Run `pre` hooks in ascending priority until one terminates the
    /// request. Only hooks that ran are kept for `post`.
    pub fn pre(&mut self, ctx: &mut Context) {
        if self.state != PipelineState::Idle {
            return;
        }
        self.state = PipelineState::PreRunning;

        for item in self.items.iter_mut() {
            if ctx.terminated() {
                break;
            }
            item.pre(ctx);
            self.ran += 1;
        }

        if ctx.terminated() {
            self.items.truncate(self.ran);
            self.state = PipelineState::Terminated;
        } else {
            self.state = PipelineState::Ready;
        }
    }

    /// Run `post` for every hook whose `pre` ran, in reverse. Runs at most
    /// once.
    pub fn post(&mut self, ctx: &mut Context) {
        if matches!(self.state, PipelineState::PostRunning | PipelineState::Done) {
            return;
        }
        self.state = PipelineState::PostRunning;

        let ran = self.ran.min(self.items.len());
        for item in self.items[..ran].iter_mut().rev() {
            item.post(ctx);
        }
        self.state = PipelineState::Done;
    }

    /// `pre`, then `inner` unless terminated, then `post`. `post` still
    /// runs if `pre` or `inner` panics; the panic is resumed afterwards.
    pub fn wrap<F>(mut self, ctx: &mut Context, inner: F)
    where
        F: FnOnce(&mut Context),
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pre(ctx);
            if !ctx.terminated() {
                inner(ctx);
            }
        }));
        self.post(ctx);
        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }
}
