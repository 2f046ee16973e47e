//! Segment routers: one `/`-delimited segment per hop.
//!
//! # Responsibilities
//! - Look up the next segment in a key table
//! - Fire the root handler when no segment remains
//! - Fall back to an asterisk handler, optionally constrained by a regex and
//!   recording the segment under a capture group
//!
//! # Design Decisions
//! - One router, two tables: `DirRouter` hashes, `BinRouter` binary-searches
//!   a sorted vector. Semantics are shared so the two cannot drift
//! - Leaf handlers are locked on registration; wrap them in
//!   `Handler::unlocked` to let them own everything beneath their key
//! - Case-insensitivity applies to keys registered after it is enabled

use std::collections::HashMap;

use parking_lot::RwLock;
use regex::Regex;

use crate::context::Context;
use crate::dispatch::dispatch;
use crate::error::RouteError;
use crate::routing::Handler;

/// Key storage behind a segment router.
pub trait SegmentTable: Default + Send + Sync + 'static {
    fn insert(&mut self, key: String, handler: Handler);
    fn lookup(&self, key: &str) -> Option<Handler>;
    /// Registered keys in ascending order.
    fn keys(&self) -> Vec<String>;
}

/// Hash map table: O(1) expected lookup.
#[derive(Default)]
pub struct HashTable(HashMap<String, Handler>);

impl SegmentTable for HashTable {
    fn insert(&mut self, key: String, handler: Handler) {
        self.0.insert(key, handler);
    }

    fn lookup(&self, key: &str) -> Option<Handler> {
        self.0.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Sorted vector table: O(log n) worst-case lookup.
#[derive(Default)]
pub struct SortedTable(Vec<(String, Handler)>);

impl SegmentTable for SortedTable {
    fn insert(&mut self, key: String, handler: Handler) {
        match self.0.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(pos) => self.0[pos].1 = handler,
            Err(pos) => self.0.insert(pos, (key, handler)),
        }
    }

    fn lookup(&self, key: &str) -> Option<Handler> {
        self.0
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|pos| self.0[pos].1.clone())
    }

    fn keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }
}

struct SegmentState<T> {
    table: T,
    root: Option<Handler>,
    asterisk: Option<Handler>,
    group: Option<String>,
    pattern: Option<Regex>,
    case_insensitive: bool,
}

impl<T: SegmentTable> Default for SegmentState<T> {
    fn default() -> Self {
        Self {
            table: T::default(),
            root: None,
            asterisk: None,
            group: None,
            pattern: None,
            case_insensitive: false,
        }
    }
}

impl<T> SegmentState<T> {
    fn normalize(&self, key: &str) -> String {
        let key = key.trim();
        if self.case_insensitive {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }

    /// Exact key first, then the lowercased form when case folding is on.
    /// Keys registered before folding was enabled keep their case.
    fn lookup(&self, segment: &str) -> Option<Handler>
    where
        T: SegmentTable,
    {
        let segment = segment.trim();
        self.table.lookup(segment).or_else(|| {
            self.case_insensitive
                .then(|| self.table.lookup(&segment.to_lowercase()))
                .flatten()
        })
    }
}

/// Router keyed on the next path segment.
#[derive(Default)]
pub struct SegmentRouter<T: SegmentTable> {
    state: RwLock<SegmentState<T>>,
}

/// Hash-backed segment router.
pub type DirRouter = SegmentRouter<HashTable>;

/// Binary-search-backed segment router.
pub type BinRouter = SegmentRouter<SortedTable>;

fn validate_key(key: &str) -> Result<(), RouteError> {
    if key.contains('/') || key.contains('\\') {
        return Err(RouteError::InvalidSegment(key.to_string()));
    }
    Ok(())
}

impl<T: SegmentTable> SegmentRouter<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SegmentState::default()),
        }
    }

    /// Handler for the router's own mount point.
    pub fn root(&self, handler: impl Into<Handler>) -> &Self {
        self.state.write().root = Some(handler.into());
        self
    }

    /// Handler for segments with no key of their own.
    pub fn asterisk(&self, handler: impl Into<Handler>) -> &Self {
        self.state.write().asterisk = Some(handler.into().lock_leaf());
        self
    }

    /// Capture group that receives the segment before the asterisk runs.
    pub fn group(&self, name: impl Into<String>) -> &Self {
        self.state.write().group = Some(name.into());
        self
    }

    /// Constrain the asterisk: segments not matching `pattern` are a 404.
    /// Named groups of the pattern are captured.
    pub fn pattern(&self, pattern: &str) -> Result<&Self, RouteError> {
        let regex = Regex::new(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.state.write().pattern = Some(regex);
        Ok(self)
    }

    pub fn case_insensitive(&self, enabled: bool) -> &Self {
        self.state.write().case_insensitive = enabled;
        self
    }

    /// Register one key. A key that is already present is replaced.
    pub fn register(&self, key: &str, handler: impl Into<Handler>) -> Result<&Self, RouteError> {
        validate_key(key)?;
        let mut state = self.state.write();
        let key = state.normalize(key);
        state.table.insert(key, handler.into().lock_leaf());
        Ok(self)
    }

    pub fn register_fn<F>(&self, key: &str, f: F) -> Result<&Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.register(key, Handler::func(f))
    }

    /// Register a batch. Nothing is registered if any key is invalid.
    pub fn register_all<I, K, H>(&self, rules: I) -> Result<&Self, RouteError>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        let rules = rules
            .into_iter()
            .map(|(key, handler)| {
                validate_key(key.as_ref())?;
                Ok((key.as_ref().to_string(), handler.into()))
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        let mut state = self.state.write();
        for (key, handler) in rules {
            let key = state.normalize(&key);
            state.table.insert(key, handler.lock_leaf());
        }
        Ok(self)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.read().table.keys()
    }

    pub fn view(&self, ctx: &mut Context) {
        if ctx.at_root() {
            let root = self.state.read().root.clone();
            match root {
                Some(handler) => dispatch(ctx, &handler),
                None => self.not_found(ctx),
            }
            return;
        }

        let Some(segment) = ctx.take_segment() else {
            self.not_found(ctx);
            return;
        };

        let (handler, asterisk, group, pattern) = {
            let state = self.state.read();
            (
                state.lookup(&segment),
                state.asterisk.clone(),
                state.group.clone(),
                state.pattern.clone(),
            )
        };

        if let Some(handler) = handler {
            dispatch(ctx, &handler);
            return;
        }

        let Some(asterisk) = asterisk else {
            self.not_found(ctx);
            return;
        };

        let segment = segment.trim();
        if let Some(pattern) = pattern {
            let Some(caps) = pattern.captures(segment) else {
                self.not_found(ctx);
                return;
            };
            ctx.captures_mut().record(&pattern, &caps);
        }
        if let Some(group) = group {
            ctx.captures_mut().set(group, segment);
        }
        dispatch(ctx, &asterisk);
    }

    fn not_found(&self, ctx: &mut Context) {
        let rules = {
            let state = self.state.read();
            let mut rules: Vec<String> = Vec::new();
            if state.root.is_some() {
                rules.push("/".to_string());
            }
            rules.extend(state.table.keys().into_iter().map(|k| format!("/{k}")));
            if state.asterisk.is_some() {
                rules.push("/*".to_string());
            }
            rules
        };
        ctx.not_found_listing("Registered segments", rules);
    }
}
