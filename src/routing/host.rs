//! Host routers: pick an application root by the Host header.
//!
//! # Design Decisions
//! - Both routers see the same normalized host: lowercased, port stripped
//!   (IPv6 literals keep their address, lose the brackets). An exact rule
//!   and its anchored-literal regex therefore always agree
//! - Host routers never touch the path cursor

use parking_lot::RwLock;

use crate::context::Context;
use crate::dispatch::dispatch;
use crate::error::RouteError;
use crate::routing::pattern::PatternTable;
use crate::routing::Handler;

/// Lowercase `host` and strip any port.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[..end].to_ascii_lowercase();
        }
    }

    let name = match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    };
    name.to_ascii_lowercase()
}

/// Exact host table, kept sorted for binary search.
#[derive(Default)]
pub struct HostRouter {
    hosts: RwLock<Vec<(String, Handler)>>,
    asterisk: RwLock<Option<Handler>>,
}

impl HostRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `host` (any case, port ignored). Replaces an existing entry.
    pub fn register(&self, host: &str, handler: impl Into<Handler>) -> &Self {
        let host = normalize_host(host);
        let handler = handler.into();
        let mut hosts = self.hosts.write();
        match hosts.binary_search_by(|(h, _)| h.as_str().cmp(&host)) {
            Ok(pos) => hosts[pos].1 = handler,
            Err(pos) => hosts.insert(pos, (host, handler)),
        }
        self
    }

    pub fn register_all<I, K, H>(&self, rules: I) -> &Self
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        for (host, handler) in rules {
            self.register(host.as_ref(), handler);
        }
        self
    }

    /// Handler for hosts with no entry.
    pub fn asterisk(&self, handler: impl Into<Handler>) -> &Self {
        *self.asterisk.write() = Some(handler.into());
        self
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.read().iter().map(|(h, _)| h.clone()).collect()
    }

    fn lookup(&self, host: &str) -> Option<Handler> {
        let hosts = self.hosts.read();
        hosts
            .binary_search_by(|(h, _)| h.as_str().cmp(host))
            .ok()
            .map(|pos| hosts[pos].1.clone())
    }

    pub fn view(&self, ctx: &mut Context) {
        let host = normalize_host(ctx.host());
        let handler = self.lookup(&host).or_else(|| self.asterisk.read().clone());
        match handler {
            Some(handler) => dispatch(ctx, &handler),
            None => ctx.not_found_listing("Registered hosts", self.hosts()),
        }
    }
}

/// Host router over regex rules, ordered by pattern string.
#[derive(Default)]
pub struct HostPatternRouter {
    table: PatternTable,
    asterisk: RwLock<Option<Handler>>,
}

impl HostPatternRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        pattern: &str,
        handler: impl Into<Handler>,
    ) -> Result<&Self, RouteError> {
        self.table.register(pattern, handler.into())?;
        Ok(self)
    }

    pub fn register_all<I, K, H>(&self, rules: I) -> Result<&Self, RouteError>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: Into<Handler>,
    {
        self.table.register_all(rules)?;
        Ok(self)
    }

    pub fn asterisk(&self, handler: impl Into<Handler>) -> &Self {
        *self.asterisk.write() = Some(handler.into());
        self
    }

    pub fn patterns(&self) -> Vec<String> {
        self.table.patterns()
    }

    /// Try every rule against the normalized host.
    pub fn load(&self, ctx: &mut Context) -> bool {
        let host = normalize_host(ctx.host());

        for entry in self.table.snapshot() {
            let Some(caps) = entry.regex.captures(&host) else {
                continue;
            };
            ctx.captures_mut().record(&entry.regex, &caps);
            dispatch(ctx, &entry.handler);
            return true;
        }
        false
    }

    pub fn view(&self, ctx: &mut Context) {
        if self.load(ctx) {
            return;
        }
        let asterisk = self.asterisk.read().clone();
        match asterisk {
            Some(handler) => dispatch(ctx, &handler),
            None => ctx.not_found_listing("Registered host patterns", self.patterns()),
        }
    }
}
