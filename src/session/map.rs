//! Key/value view over the session payload.

use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::SessionError;

/// Edits an object-shaped session payload by key. Nothing is stored until
/// `save`.
#[derive(Debug, Clone, Default)]
pub struct SessionMap {
    entries: Map<String, Value>,
}

impl SessionMap {
    /// Start from the request's session. A payload that is not an object
    /// yields an empty map.
    pub fn load(ctx: &Context) -> Self {
        let entries = match ctx.session() {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store the map through the app's session store.
    pub fn save(&self, ctx: &mut Context) -> Result<(), SessionError> {
        ctx.set_session(Value::Object(self.entries.clone()))
    }
}
