//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Context (host, remaining path)
//!     → host.rs (pick an application root by Host)
//!     → regex.rs / segment.rs (consume path, record captures)
//!     → dispatch (invoke the matched Handler, which may be another router)
//!     → no match: asterisk fallback, else 404
//! ```
//!
//! # Design Decisions
//! - Registration may happen while traffic flows: readers take a shared
//!   lock, writers an exclusive one
//! - Lookup order never depends on registration order
//! - The same group name written by nested routers: innermost wins

pub mod handler;
pub mod host;
mod pattern;
pub mod regex;
pub mod segment;

pub use handler::{AsAny, Handler, HandlerFn, View};
pub use host::{normalize_host, HostPatternRouter, HostRouter};
pub use regex::RegexRouter;
pub use segment::{BinRouter, DirRouter, HashTable, SegmentRouter, SegmentTable, SortedTable};
