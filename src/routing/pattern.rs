//! Compiled regex rule table shared by the path and host regex routers.

use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::RouteError;
use crate::routing::Handler;

/// One compiled rule.
pub(crate) struct PatternEntry {
    pub(crate) pattern: String,
    pub(crate) regex: Regex,
    pub(crate) handler: Handler,
}

/// Rules kept sorted by pattern string, so evaluation order never depends
/// on registration order. Registering an existing pattern replaces it.
#[derive(Default)]
pub(crate) struct PatternTable {
    entries: RwLock<Vec<Arc<PatternEntry>>>,
}

impl PatternTable {
    fn compile(pattern: &str, handler: Handler) -> Result<Arc<PatternEntry>, RouteError> {
        let regex = Regex::new(pattern).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Arc::new(PatternEntry {
            pattern: pattern.to_string(),
            regex,
            handler,
        }))
    }

    fn insert(entries: &mut Vec<Arc<PatternEntry>>, entry: Arc<PatternEntry>) {
        match entries.binary_search_by(|e| e.pattern.as_str().cmp(&entry.pattern)) {
            Ok(pos) => entries[pos] = entry,
            Err(pos) => entries.insert(pos, entry),
        }
    }

    pub(crate) fn register(&self, pattern: &str, handler: Handler) -> Result<(), RouteError> {
        let entry = Self::compile(pattern, handler)?;
        Self::insert(&mut self.entries.write(), entry);
        Ok(())
    }

    /// Register a batch. Every pattern is compiled before any is inserted,
    /// so a bad pattern leaves the table untouched.
    pub(crate) fn register_all<I, K, H>(&self, rules: I) -> Result<(), RouteError>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        let compiled = rules
            .into_iter()
            .map(|(pattern, handler)| Self::compile(pattern.as_ref(), handler.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = self.entries.write();
        for entry in compiled {
            Self::insert(&mut entries, entry);
        }
        Ok(())
    }

    /// Copy of the current rules. Matching runs on the copy so handlers may
    /// register further rules without deadlocking.
    pub(crate) fn snapshot(&self) -> Vec<Arc<PatternEntry>> {
        self.entries.read().clone()
    }

    pub(crate) fn patterns(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.pattern.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}
