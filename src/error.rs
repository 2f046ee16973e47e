//! Error types shared across subsystems.
//!
//! # Design Decisions
//! - Setup-time failures (bad patterns, bad segment names, bad config) are
//!   returned as `Result` so misconfiguration never panics at startup
//! - Request-time failures never surface as `Err` to the transport; they are
//!   turned into status outcomes on the `Context` (404/405/500)

use thiserror::Error;

/// Errors raised while registering routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A regex rule failed to compile.
    #[error("invalid route pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A segment key contained a path separator.
    #[error("segment `{0}` must not contain `/` or `\\`")]
    InvalidSegment(String),
}

/// Errors raised when a handler demands a typed capture.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture group `{0}` is missing")]
    Missing(String),

    #[error("capture group `{name}` value `{value}` is not a valid {expected}")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// Errors raised by session stores.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("session token `{0}` is malformed")]
    InvalidToken(String),
}

/// Errors raised by the HTTP transport bridge.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
