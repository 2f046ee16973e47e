//! Protocol-agnostic request descriptor.
//!
//! # Responsibilities
//! - Carry what the core needs from the transport: method, path, host,
//!   headers, query, body, and the transport-security flag
//! - Build from `http::request::Parts` for the axum bridge, or by hand in tests
//! - Routers see the percent-decoded path; the query stays raw

use axum::body::Bytes;
use axum::http::header::{HeaderName, HOST};
use axum::http::{request::Parts, HeaderMap, HeaderValue, Method};

/// The inbound request as seen by the dispatch core.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    host: String,
    headers: HeaderMap,
    body: Bytes,
    secure: bool,
}

impl Request {
    /// Create a request for `path`. The query string, if any, is split off.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        Self {
            method,
            path,
            query,
            host: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            secure: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Build from transport request parts.
    pub fn from_parts(parts: &Parts, body: Bytes, secure: bool) -> Self {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            path: decode_path(parts.uri.path()),
            query: parts.uri.query().map(str::to_string),
            host,
            headers: parts.headers.clone(),
            body,
            secure,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Append a header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid request header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Remove `name` and report whether it was present. Used to honour a
    /// trusted "request is secure" header set by a TLS terminator.
    pub(crate) fn take_header(&mut self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.headers.remove(name).is_some()
    }

    pub(crate) fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }
}

/// Percent-decode a raw URI path. Paths that do not decode to UTF-8 are
/// kept as received.
fn decode_path(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(path) => path.into_owned(),
        Err(e) => {
            tracing::debug!(path = raw, error = %e, "Path is not valid UTF-8 once decoded");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_split() {
        let req = Request::get("/search?q=rust");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust"));
    }

    #[test]
    fn test_from_parts_prefers_host_header() {
        let (parts, _) = axum::http::Request::builder()
            .uri("http://authority.test/a/b?x=1")
            .header("host", "example.com:8080")
            .body(())
            .unwrap()
            .into_parts();

        let req = Request::from_parts(&parts, Bytes::new(), false);
        assert_eq!(req.host(), "example.com:8080");
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.query(), Some("x=1"));
    }

    #[test]
    fn test_from_parts_decodes_path() {
        let (parts, _) = axum::http::Request::builder()
            .uri("/user/john%20doe/caf%C3%A9?q=a%20b")
            .body(())
            .unwrap()
            .into_parts();

        let req = Request::from_parts(&parts, Bytes::new(), false);
        assert_eq!(req.path(), "/user/john doe/café");
        assert_eq!(req.query(), Some("q=a%20b"));

        let (parts, _) = axum::http::Request::builder()
            .uri("/bad%FF")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(Request::from_parts(&parts, Bytes::new(), false).path(), "/bad%FF");
    }

    #[test]
    fn test_take_header() {
        let mut req = Request::get("/").with_header("X-Secure-Mode", "1");
        assert!(req.take_header("x-secure-mode"));
        assert!(req.header("x-secure-mode").is_none());
        assert!(!req.take_header(""));
    }
}
