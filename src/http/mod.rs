//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers, request ID)
//!     → body buffered, converted to context::Request
//!     → App::serve on the blocking pool
//!     → context::Response converted back
//!     → Send to client
//! ```

pub mod server;

pub use server::HttpServer;
