//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for an application.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for an application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used in logs.
    pub name: String,

    /// Development mode: verbose 404 pages, fault details in 500 pages,
    /// loud reporting of requests that produced no output.
    pub debug: bool,

    /// Transport settings.
    pub server: ServerConfig,

    /// Middleware settings.
    pub middleware: MiddlewareConfig,

    /// Session store settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            debug: false,
            server: ServerConfig::default(),
            middleware: MiddlewareConfig::default(),
            session: SessionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Header whose presence marks a request as secure (set by a TLS
    /// terminator in front of the app). Empty disables the check.
    pub secure_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 16 * 1024 * 1024,
            secure_header: String::new(),
        }
    }
}

/// Middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Globally enable middleware. When false every chain is a no-op.
    pub enabled: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Which session store backs `Context::set_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    Memory,
    File,
    Cookie,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Store variant.
    pub store: SessionStoreKind,

    /// Name of the cookie carrying the session token (or payload).
    pub cookie_name: String,

    /// Sliding expiry in seconds.
    pub expire_secs: u64,

    /// Interval between background sweeps of the memory store, in seconds.
    pub sweep_interval_secs: u64,

    /// Directory for the file store.
    pub file_path: String,
}

impl SessionConfig {
    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: SessionStoreKind::Memory,
            cookie_name: "__session".to_string(),
            expire_secs: 20 * 60,
            sweep_interval_secs: 10 * 60,
            file_path: String::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
