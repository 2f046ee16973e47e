//! Fault reporting for panics caught at the request boundary.

use std::any::Any;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::context::Context;

/// One handler fault, or one request that produced no output.
#[derive(Debug, Clone, Serialize)]
pub struct Fault {
    pub request_id: String,
    pub method: String,
    pub host: String,
    pub path: String,
    /// Where the fault surfaced: `dispatch`, `post` or `no_output`.
    pub phase: &'static str,
    pub message: String,
}

impl Fault {
    pub fn new(ctx: &Context, phase: &'static str, message: impl Into<String>) -> Self {
        Self {
            request_id: ctx.request_id().to_string(),
            method: ctx.method().to_string(),
            host: ctx.host().to_string(),
            path: ctx.path().to_string(),
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "request_id: {}", self.request_id)?;
        writeln!(f, "request:    {} {}{}", self.method, self.host, self.path)?;
        writeln!(f, "phase:      {}", self.phase)?;
        write!(f, "message:    {}", self.message)
    }
}

pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &Fault);
}

/// Reports faults as error-level log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report(&self, fault: &Fault) {
        tracing::error!(
            request_id = %fault.request_id,
            method = %fault.method,
            host = %fault.host,
            path = %fault.path,
            phase = fault.phase,
            message = %fault.message,
            "Request fault"
        );
    }
}

/// Writes each fault to `<dir>/<secs>_<nanos>.txt`, and logs it.
#[derive(Debug, Clone)]
pub struct FileReporter {
    dir: PathBuf,
}

impl FileReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FaultReporter for FileReporter {
    fn report(&self, fault: &Fault) {
        LogReporter.report(fault);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let path = self
            .dir
            .join(format!("{}_{}.txt", now.as_secs(), now.subsec_nanos()));

        let written = fs::create_dir_all(&self.dir).and_then(|()| fs::write(&path, fault.to_string()));
        if let Err(e) = written {
            tracing::error!(path = %path.display(), error = %e, "Failed to write fault report");
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
