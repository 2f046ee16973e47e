//! Per-request state.
//!
//! # Data Flow
//! ```text
//! transport request
//!     → request.rs (Request descriptor)
//!     → state.rs (Context: path cursor, captures, data, session, response)
//!     → matchers consume path and write captures
//!     → handlers read captures, write response.rs (Response)
//!     → Context::into_response back to the transport
//! ```
//!
//! # Design Decisions
//! - One Context per request, owned by the request's flow, never shared
//! - Any write terminates the request; termination is monotonic
//! - Cookies set during the request are visible to later reads

pub mod captures;
pub mod request;
pub mod response;
pub mod state;

pub use captures::Captures;
pub use request::Request;
pub use response::Response;
pub use state::{Context, X_REQUEST_ID};
