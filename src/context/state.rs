//! Per-request state shared by matchers, middleware and handlers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::header::{HeaderName, CONNECTION, COOKIE, SET_COOKIE, UPGRADE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use cookie::Cookie;
use serde_json::{Map, Value};

use crate::app::App;
use crate::config::AppConfig;
use crate::context::{Captures, Request, Response};
use crate::error::SessionError;

/// Header carrying the request id assigned by the transport.
pub const X_REQUEST_ID: &str = "x-request-id";

/// State of one in-flight request.
///
/// Created once per inbound request and exclusively owned by that request's
/// handling flow. `remaining_path` only ever shrinks (until an explicit
/// reset), and `terminated` only ever goes from false to true.
pub struct Context {
    app: Arc<App>,
    request: Request,
    request_id: String,
    cookies: HashMap<String, String>,
    remaining_path: String,
    consumed_path: String,
    captures: Captures,
    dir_path: Vec<String>,
    data: Map<String, Value>,
    session: Option<Value>,
    secure: bool,
    terminated: bool,
    response: Response,
}

impl Context {
    pub fn new(app: Arc<App>, request: Request) -> Self {
        let request_id = request
            .header(X_REQUEST_ID)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let cookies = parse_cookies(request.headers());
        let remaining_path = request.path().to_string();
        let secure = request.is_secure();

        Self {
            app,
            request,
            request_id,
            cookies,
            remaining_path,
            consumed_path: String::new(),
            captures: Captures::new(),
            dir_path: Vec::new(),
            data: Map::new(),
            session: None,
            secure,
            terminated: false,
            response: Response::default(),
        }
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Snapshot of the live application config.
    pub fn config(&self) -> Arc<AppConfig> {
        self.app.config()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn host(&self) -> &str {
        self.request.host()
    }

    /// Full request path, independent of what matchers consumed.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    // ---- path cursor -------------------------------------------------------

    /// Suffix of the path not yet consumed by matchers.
    pub fn remaining_path(&self) -> &str {
        &self.remaining_path
    }

    /// Path matched so far, i.e. where the current handler is mounted.
    pub fn consumed_path(&self) -> &str {
        &self.consumed_path
    }

    /// Segments consumed by segment routers, in order.
    pub fn dir_path(&self) -> &[String] {
        &self.dir_path
    }

    /// Advance the cursor past a regex match ending at byte `end` of the
    /// remaining path. Any text skipped before an unanchored match counts as
    /// consumed too.
    pub(crate) fn consume_match(&mut self, end: usize) {
        let consumed: String = self.remaining_path.drain(..end).collect();
        self.consumed_path.push_str(&consumed);
    }

    /// Split off the next `/`-delimited segment. Returns `None` when nothing
    /// but an optional trailing slash remains.
    pub(crate) fn take_segment(&mut self) -> Option<String> {
        if self.at_root() {
            return None;
        }

        let trimmed = self.remaining_path.trim_start_matches('/');
        let (segment, rest) = match trimmed.find('/') {
            Some(pos) => (trimmed[..pos].to_string(), trimmed[pos..].to_string()),
            None => (trimmed.to_string(), String::new()),
        };

        self.consumed_path.push('/');
        self.consumed_path.push_str(&segment);
        self.remaining_path = rest;
        self.dir_path.push(segment.clone());
        Some(segment)
    }

    /// True when the remaining path is empty or a lone slash.
    pub fn at_root(&self) -> bool {
        self.remaining_path.is_empty() || self.remaining_path == "/"
    }

    /// Rewind the cursor to the full request path.
    pub(crate) fn reset_path(&mut self) {
        self.remaining_path = self.request.path().to_string();
        self.consumed_path.clear();
    }

    // ---- captures and contextual data ---------------------------------------

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    pub fn captures_mut(&mut self) -> &mut Captures {
        &mut self.captures
    }

    /// Parse a capture into `T`, or record a 404 and return `None`.
    pub fn require<T: FromStr>(&mut self, name: &str) -> Option<T> {
        match self.captures.parse::<T>(name) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(request_id = %self.request_id, error = %e, "Capture conversion failed");
                self.not_found();
                None
            }
        }
    }

    /// Contextual data set by middleware (e.g. the logged-in user).
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn set_data(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }

    // ---- request classification ---------------------------------------------

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn is_websocket(&self) -> bool {
        let connection_upgrade = self
            .request
            .headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

        connection_upgrade
            && self
                .request
                .header(UPGRADE.as_str())
                .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }

    /// Do-Not-Track requested.
    pub fn is_dnt(&self) -> bool {
        self.header("dnt") == Some("1") || self.header("x-do-not-track") == Some("1")
    }

    // ---- cookies -------------------------------------------------------------

    /// Request cookie value, including cookies set earlier in this request.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Queue a `Set-Cookie` and make the value visible to later reads.
    pub fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.cookies
            .insert(cookie.name().to_string(), cookie.value().to_string());
        self.append_set_cookie(&cookie);
    }

    /// Queue a removal cookie for `name`.
    pub fn remove_cookie(&mut self, name: &str) {
        self.cookies.remove(name);
        let mut removal = Cookie::build((name.to_string(), String::new()))
            .path("/")
            .build();
        removal.make_removal();
        self.append_set_cookie(&removal);
    }

    fn append_set_cookie(&mut self, cookie: &Cookie<'_>) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                self.response.headers_mut().append(SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %cookie.name(), "Cookie is not a valid header value"),
        }
    }

    // ---- session -------------------------------------------------------------

    /// Payload hydrated by the session store for this request.
    pub fn session(&self) -> Option<&Value> {
        self.session.as_ref()
    }

    /// Store `payload` through the configured session store.
    pub fn set_session(&mut self, payload: Value) -> Result<(), SessionError> {
        let store = self.app.session_store();
        store.set(self, payload)
    }

    /// Drop the session through the configured session store.
    pub fn destroy_session(&mut self) -> Result<(), SessionError> {
        let store = self.app.session_store();
        store.destroy(self)
    }

    pub(crate) fn bind_session(&mut self, payload: Option<Value>) {
        self.session = payload;
    }

    // ---- response ------------------------------------------------------------

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// Status used by the next write.
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        self.response.headers_mut()
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers_mut().insert(name, value);
    }

    /// Append to the body. Terminates the request.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.terminated = true;
        self.response.write(data.as_ref());
    }

    /// Send the status with no body. Terminates the request.
    pub fn write_head(&mut self, status: StatusCode) {
        self.terminated = true;
        self.response.set_status(status);
        self.response.mark_started();
    }

    /// True once a response has begun or handling was explicitly stopped.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Stop descending into further middleware and matchers.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn forbidden(&mut self) {
        self.error(StatusCode::FORBIDDEN);
    }

    pub fn not_found(&mut self) {
        self.error(StatusCode::NOT_FOUND);
    }

    pub fn method_not_allowed(&mut self) {
        self.error(StatusCode::METHOD_NOT_ALLOWED);
    }

    pub fn internal_error(&mut self) {
        self.error(StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Render the app's error page for `status` and terminate.
    pub fn error(&mut self, status: StatusCode) {
        self.response.set_status(status);
        let page = self.app.error_pages().get(status);
        page(self);
        self.terminated = true;
    }

    /// 404 that lists the rules of the router that failed to match when the
    /// app runs in debug mode.
    pub(crate) fn not_found_listing<I>(&mut self, heading: &str, rules: I)
    where
        I: IntoIterator<Item = String>,
    {
        if !self.config().debug {
            self.not_found();
            return;
        }

        let mut body = format!(
            "404 Not Found\r\n\r\n{}{}\r\n\r\n{}:\r\n",
            self.host(),
            self.consumed_path,
            heading
        );
        for rule in rules {
            body.push_str(&rule);
            body.push_str("\r\n");
        }

        self.response.set_status(StatusCode::NOT_FOUND);
        self.response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.write(body);
    }

    pub(crate) fn discard_body(&mut self) {
        self.response.discard_body();
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", self.request.method())
            .field("host", &self.request.host())
            .field("remaining_path", &self.remaining_path)
            .field("consumed_path", &self.consumed_path)
            .field("captures", &self.captures)
            .field("secure", &self.secure)
            .field("terminated", &self.terminated)
            .finish()
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}
