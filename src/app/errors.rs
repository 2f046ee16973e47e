//! Error pages keyed by status code.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use parking_lot::RwLock;

use crate::context::Context;

/// Renders the body for an error status. The status is already set on the
/// context when the page runs.
pub type ErrorPage = Arc<dyn Fn(&mut Context) + Send + Sync>;

#[derive(Default)]
pub struct ErrorPages {
    pages: RwLock<HashMap<StatusCode, ErrorPage>>,
}

impl ErrorPages {
    pub fn set<F>(&self, status: StatusCode, page: F)
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.pages.write().insert(status, Arc::new(page));
    }

    /// Registered page for `status`, or the built-in one.
    pub fn get(&self, status: StatusCode) -> ErrorPage {
        self.pages
            .read()
            .get(&status)
            .cloned()
            .unwrap_or_else(|| Arc::new(default_page))
    }
}

fn default_page(ctx: &mut Context) {
    let status = ctx.status();
    let title = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    ctx.write(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body><h1>{title}</h1></body></html>\n"
    ));
}
