//! The session store capability set and what the variants share.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cookie::Cookie;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SessionConfig;
use crate::context::Context;
use crate::error::SessionError;
use crate::session::clock::{Clock, SystemClock};
use crate::session::key::{HashKeyGenerator, KeyGenerator};

/// Hydrates, stores and drops the payload bound to a client token.
///
/// A client presenting no token and a client presenting an unknown or
/// expired token both end up with no session; the latter also loses its
/// token cookie.
pub trait SessionStore: Send + Sync {
    /// Store `payload` for this client and bind it to the context.
    fn set(&self, ctx: &mut Context, payload: Value) -> Result<(), SessionError>;

    /// Called once per request, before any handler runs.
    fn init(&self, ctx: &mut Context) -> Result<(), SessionError>;

    fn destroy(&self, ctx: &mut Context) -> Result<(), SessionError>;
}

/// Settings every store variant takes.
#[derive(Clone)]
pub struct StoreOptions {
    pub cookie_name: String,
    pub ttl: Duration,
    pub clock: Arc<dyn Clock>,
    pub keys: Arc<dyn KeyGenerator>,
}

impl StoreOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            ttl: config.expire(),
            clock: Arc::new(SystemClock),
            keys: Arc::new(HashKeyGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_keys(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub(crate) fn expiry(&self) -> SystemTime {
        self.clock.now() + self.ttl
    }

    /// Token presented by the client, if any.
    pub(crate) fn token(&self, ctx: &Context) -> Option<String> {
        ctx.cookie(&self.cookie_name)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Token presented by the client, or a new one sent back to it.
    pub(crate) fn token_or_issue(&self, ctx: &mut Context) -> String {
        if let Some(token) = self.token(ctx).filter(|t| is_valid_token(t)) {
            return token;
        }
        let token = self.keys.generate();
        let cookie = self.cookie(token.clone(), ctx.is_secure()).build();
        ctx.set_cookie(cookie);
        token
    }

    /// Builder for the session cookie: `HttpOnly`, `Path=/`, `Secure` on
    /// secure requests.
    pub(crate) fn cookie(&self, value: String, secure: bool) -> cookie::CookieBuilder<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(secure)
    }
}

/// Tokens are used as file names, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Serialized form used by the file and cookie stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub(crate) payload: Value,
    /// Milliseconds since the Unix epoch.
    pub(crate) expires_at: u64,
}

impl Envelope {
    pub(crate) fn new(payload: Value, expires_at: SystemTime) -> Self {
        Self {
            payload,
            expires_at: to_millis(expires_at),
        }
    }

    pub(crate) fn is_live(&self, now: SystemTime) -> bool {
        to_millis(now) < self.expires_at
    }
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validation() {
        assert!(is_valid_token("abcDEF012_-"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("../etc/passwd"));
        assert!(!is_valid_token("a b"));
    }

    #[test]
    fn test_envelope_liveness() {
        let now = SystemTime::now();
        let envelope = Envelope::new(Value::Null, now + Duration::from_secs(5));
        assert!(envelope.is_live(now));
        assert!(!envelope.is_live(now + Duration::from_secs(5)));
    }
}
