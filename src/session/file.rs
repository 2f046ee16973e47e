//! File-backed session store: one JSON file per token.
//!
//! Every call goes to disk. There is no cache and no sweep; expired files
//! are removed when their token is next presented.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::context::Context;
use crate::error::SessionError;
use crate::session::store::{is_valid_token, Envelope, SessionStore, StoreOptions};

const FILE_EXT: &str = "session";

pub struct FileStore {
    options: StoreOptions,
    dir: PathBuf,
}

impl FileStore {
    pub fn new(options: StoreOptions, dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, token: &str) -> Result<PathBuf, SessionError> {
        if !is_valid_token(token) {
            return Err(SessionError::InvalidToken(token.to_string()));
        }
        Ok(self.dir.join(format!("{token}.{FILE_EXT}")))
    }

    fn write(&self, path: &Path, envelope: &Envelope) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, serde_json::to_vec(envelope)?)?;
        Ok(())
    }

    /// Read a record. Missing and unreadable-as-JSON files both yield `None`.
    fn read(&self, path: &Path) -> Result<Option<Envelope>, SessionError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt session file");
                Ok(None)
            }
        }
    }

    fn remove(path: &Path) -> Result<(), SessionError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SessionStore for FileStore {
    fn set(&self, ctx: &mut Context, payload: Value) -> Result<(), SessionError> {
        let token = self.options.token_or_issue(ctx);
        let path = self.path_for(&token)?;
        self.write(&path, &Envelope::new(payload.clone(), self.options.expiry()))?;
        ctx.bind_session(Some(payload));
        Ok(())
    }

    fn init(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let Some(token) = self.options.token(ctx) else {
            return Ok(());
        };
        let Ok(path) = self.path_for(&token) else {
            tracing::debug!(request_id = %ctx.request_id(), "Rejecting malformed session token");
            ctx.remove_cookie(&self.options.cookie_name);
            return Ok(());
        };

        match self.read(&path)? {
            Some(envelope) if envelope.is_live(self.options.clock.now()) => {
                let payload = envelope.payload;
                self.write(&path, &Envelope::new(payload.clone(), self.options.expiry()))?;
                ctx.bind_session(Some(payload));
            }
            _ => {
                Self::remove(&path)?;
                ctx.remove_cookie(&self.options.cookie_name);
            }
        }
        Ok(())
    }

    fn destroy(&self, ctx: &mut Context) -> Result<(), SessionError> {
        if let Some(token) = self.options.token(ctx) {
            if let Ok(path) = self.path_for(&token) {
                Self::remove(&path)?;
            }
            ctx.remove_cookie(&self.options.cookie_name);
        }
        ctx.bind_session(None);
        Ok(())
    }
}
