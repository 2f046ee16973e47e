//! Buffered response produced by one request.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Status, headers and body written by handlers.
///
/// Byte-level delivery belongs to the transport; the core only records what
/// was produced and whether anything was produced at all.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    started: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// True once a status or body byte was written.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn write(&mut self, data: &[u8]) {
        if !self.started && !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        self.started = true;
        self.body.extend_from_slice(data);
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// Drop any partial body so an error page can replace it. Headers other
    /// than the content type (notably cookies) are kept.
    pub(crate) fn discard_body(&mut self) {
        self.body.clear();
        self.headers.remove(CONTENT_TYPE);
        self.started = false;
    }
}
