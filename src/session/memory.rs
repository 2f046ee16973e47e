//! In-process session store with a background expiry sweep.
//!
//! # Design Decisions
//! - One mutex guards the records and the sweeper flag, so at most one
//!   sweep task is ever active
//! - The sweep task holds a weak reference; dropping the store ends it
//! - The sweep stops itself once the map is empty and is restarted by the
//!   next `set`
//! - Without a tokio runtime no sweep runs and expiry is purely lazy

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::context::Context;
use crate::error::SessionError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::session::store::{SessionStore, StoreOptions};

struct Record {
    payload: Value,
    expires_at: SystemTime,
}

#[derive(Default)]
struct SweepState {
    records: HashMap<String, Record>,
    sweeping: bool,
}

struct MemoryInner {
    options: StoreOptions,
    sweep_interval: Duration,
    shutdown: Option<Shutdown>,
    state: Mutex<SweepState>,
}

impl MemoryInner {
    /// Drop expired records. Returns false, clearing the sweeper flag, when
    /// nothing is left to expire.
    fn sweep(&self) -> bool {
        let now = self.options.clock.now();
        let mut state = self.state.lock();

        let before = state.records.len();
        state.records.retain(|_, record| now < record.expires_at);
        let removed = before - state.records.len();

        metrics::record_session_sweep(removed);
        metrics::record_sessions(state.records.len());
        tracing::debug!(removed, remaining = state.records.len(), "Session sweep finished");

        if state.records.is_empty() {
            state.sweeping = false;
            return false;
        }
        true
    }
}

/// Sessions held in process memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new(options: StoreOptions, sweep_interval: Duration, shutdown: Option<Shutdown>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                options,
                sweep_interval,
                shutdown,
                state: Mutex::new(SweepState::default()),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a sweep task is scheduled.
    pub fn is_sweeping(&self) -> bool {
        self.inner.state.lock().sweeping
    }

    /// Run one sweep pass now.
    pub fn sweep(&self) {
        self.inner.sweep();
    }

    fn start_sweeper(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime, session expiry stays lazy");
            self.inner.state.lock().sweeping = false;
            return;
        };

        let weak: Weak<MemoryInner> = Arc::downgrade(&self.inner);
        let period = self.inner.sweep_interval;
        let mut shutdown_rx = self.inner.shutdown.as_ref().map(Shutdown::subscribe);

        handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wait_for_shutdown(&mut shutdown_rx) => {
                        tracing::debug!("Session sweeper stopping");
                        break;
                    }
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.sweep() {
                    break;
                }
            }
        });
    }
}

async fn wait_for_shutdown(rx: &mut Option<broadcast::Receiver<()>>) {
    match rx {
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl SessionStore for MemoryStore {
    fn set(&self, ctx: &mut Context, payload: Value) -> Result<(), SessionError> {
        let options = &self.inner.options;
        let token = options.token_or_issue(ctx);
        let expires_at = options.expiry();

        let (start, active) = {
            let mut state = self.inner.state.lock();
            state.records.insert(
                token,
                Record {
                    payload: payload.clone(),
                    expires_at,
                },
            );
            let start = !state.sweeping;
            state.sweeping = true;
            (start, state.records.len())
        };

        metrics::record_sessions(active);
        if start {
            self.start_sweeper();
        }
        ctx.bind_session(Some(payload));
        Ok(())
    }

    fn init(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let options = &self.inner.options;
        let Some(token) = options.token(ctx) else {
            return Ok(());
        };

        let now = options.clock.now();
        let payload = {
            let mut state = self.inner.state.lock();
            let live = state.records.get(&token).map(|r| now < r.expires_at);
            match live {
                Some(true) => state.records.get_mut(&token).map(|record| {
                    record.expires_at = now + options.ttl;
                    record.payload.clone()
                }),
                Some(false) => {
                    state.records.remove(&token);
                    None
                }
                None => None,
            }
        };

        match payload {
            Some(payload) => ctx.bind_session(Some(payload)),
            None => {
                tracing::debug!(request_id = %ctx.request_id(), "Session token unknown or expired");
                ctx.remove_cookie(&options.cookie_name);
            }
        }
        Ok(())
    }

    fn destroy(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let options = &self.inner.options;
        if let Some(token) = options.token(ctx) {
            let active = {
                let mut state = self.inner.state.lock();
                state.records.remove(&token);
                state.records.len()
            };
            metrics::record_sessions(active);
            ctx.remove_cookie(&options.cookie_name);
        }
        ctx.bind_session(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::AppConfig;
    use crate::context::Request;
    use crate::session::clock::{Clock, ManualClock};
    use crate::session::key::KeyGenerator;
    use axum::http::header::SET_COOKIE;
    use serde_json::json;

    struct FixedKey;

    impl KeyGenerator for FixedKey {
        fn generate(&self) -> String {
            "token123".to_string()
        }
    }

    fn store(clock: &Arc<ManualClock>, shutdown: Option<Shutdown>) -> MemoryStore {
        let options = StoreOptions::from_config(&Default::default())
            .with_clock(clock.clone())
            .with_keys(Arc::new(FixedKey));
        MemoryStore::new(
            StoreOptions {
                ttl: Duration::from_secs(60),
                ..options
            },
            Duration::from_secs(10),
            shutdown,
        )
    }

    fn context(cookie: Option<&str>) -> Context {
        let mut request = Request::get("/");
        if let Some(token) = cookie {
            request = request.with_header("Cookie", &format!("__session={token}"));
        }
        Context::new(App::new(AppConfig::default()), request)
    }

    fn expiry_of(store: &MemoryStore, token: &str) -> SystemTime {
        store.inner.state.lock().records[token].expires_at
    }

    #[test]
    fn test_set_issues_token_once() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);

        let mut ctx = context(None);
        store.set(&mut ctx, json!({"user": "alice"})).unwrap();
        assert_eq!(ctx.cookie("__session"), Some("token123"));
        assert_eq!(ctx.session(), Some(&json!({"user": "alice"})));
        let header = ctx.response().headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Path=/"));

        let mut ctx = context(Some("token123"));
        store.set(&mut ctx, json!(2)).unwrap();
        assert!(ctx.response().headers().get(SET_COOKIE).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sliding_expiry() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);
        store.set(&mut context(None), json!("payload")).unwrap();
        let first = expiry_of(&store, "token123");

        clock.advance(Duration::from_secs(30));
        let mut ctx = context(Some("token123"));
        store.init(&mut ctx).unwrap();

        assert_eq!(ctx.session(), Some(&json!("payload")));
        let second = expiry_of(&store, "token123");
        assert_eq!(second, clock.now() + Duration::from_secs(60));
        assert!(second > first);
    }

    #[test]
    fn test_expired_and_unknown_tokens_are_cleared() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);
        store.set(&mut context(None), json!("payload")).unwrap();

        clock.advance(Duration::from_secs(61));
        let mut ctx = context(Some("token123"));
        store.init(&mut ctx).unwrap();
        assert_eq!(ctx.session(), None);
        assert_eq!(ctx.cookie("__session"), None);
        assert!(store.is_empty());

        let mut ctx = context(Some("nope"));
        store.init(&mut ctx).unwrap();
        assert_eq!(ctx.session(), None);
        assert!(ctx.response().headers().get(SET_COOKIE).is_some());

        let mut ctx = context(None);
        store.init(&mut ctx).unwrap();
        assert_eq!(ctx.session(), None);
        assert!(ctx.response().headers().get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_destroy() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);
        store.set(&mut context(None), json!(1)).unwrap();

        let mut ctx = context(Some("token123"));
        store.init(&mut ctx).unwrap();
        store.destroy(&mut ctx).unwrap();
        assert_eq!(ctx.session(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_runtime_keeps_expiry_lazy() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);
        store.set(&mut context(None), json!(1)).unwrap();
        assert!(!store.is_sweeping());

        clock.advance(Duration::from_secs(61));
        store.sweep();
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_and_stops() {
        let clock = Arc::new(ManualClock::default());
        let store = store(&clock, None);
        store.set(&mut context(None), json!(1)).unwrap();
        assert!(store.is_sweeping());

        // First tick: record still live, sweeper keeps going.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(store.len(), 1);
        assert!(store.is_sweeping());

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.is_empty());
        assert!(!store.is_sweeping());

        // Restarted lazily.
        store.set(&mut context(None), json!(2)).unwrap();
        assert!(store.is_sweeping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::default());
        let shutdown = Shutdown::new();
        let store = store(&clock, Some(shutdown.clone()));
        store.set(&mut context(None), json!(1)).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(shutdown.receiver_count(), 1);

        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(shutdown.receiver_count(), 0);
    }
}
