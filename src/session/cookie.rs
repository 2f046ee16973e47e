//! Client-side session store: the payload travels in the cookie itself.

use serde_json::Value;

use crate::context::Context;
use crate::error::SessionError;
use crate::session::store::{Envelope, SessionStore, StoreOptions};

/// Browsers drop cookies larger than this.
const MAX_COOKIE_BYTES: usize = 4096;

pub struct CookieStore {
    options: StoreOptions,
}

impl CookieStore {
    pub fn new(options: StoreOptions) -> Self {
        Self { options }
    }

    fn issue(&self, ctx: &mut Context, payload: &Value) -> Result<(), SessionError> {
        let envelope = Envelope::new(payload.clone(), self.options.expiry());
        let encoded = urlencoding::encode(&serde_json::to_string(&envelope)?).into_owned();
        if encoded.len() > MAX_COOKIE_BYTES {
            tracing::warn!(
                request_id = %ctx.request_id(),
                bytes = encoded.len(),
                "Session cookie exceeds browser size limit"
            );
        }

        let max_age = cookie::time::Duration::seconds(self.options.ttl.as_secs() as i64);
        let cookie = self
            .options
            .cookie(encoded, ctx.is_secure())
            .max_age(max_age)
            .build();
        ctx.set_cookie(cookie);
        Ok(())
    }

    fn decode(raw: &str) -> Option<Envelope> {
        let json = urlencoding::decode(raw).ok()?;
        serde_json::from_str(&json).ok()
    }
}

impl SessionStore for CookieStore {
    fn set(&self, ctx: &mut Context, payload: Value) -> Result<(), SessionError> {
        self.issue(ctx, &payload)?;
        ctx.bind_session(Some(payload));
        Ok(())
    }

    fn init(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let Some(raw) = self.options.token(ctx) else {
            return Ok(());
        };

        match Self::decode(&raw) {
            Some(envelope) if envelope.is_live(self.options.clock.now()) => {
                self.issue(ctx, &envelope.payload)?;
                ctx.bind_session(Some(envelope.payload));
            }
            _ => {
                tracing::debug!(request_id = %ctx.request_id(), "Session cookie expired or unreadable");
                ctx.remove_cookie(&self.options.cookie_name);
            }
        }
        Ok(())
    }

    fn destroy(&self, ctx: &mut Context) -> Result<(), SessionError> {
        if self.options.token(ctx).is_some() {
            ctx.remove_cookie(&self.options.cookie_name);
        }
        ctx.bind_session(None);
        Ok(())
    }
}
