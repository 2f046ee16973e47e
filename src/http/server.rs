//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (tracing, timeouts, body limits, request ID)
//! - Bridge each request into `App::serve` and back
//! - Stop accepting and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::App;
use crate::config::AppConfig;
use crate::context::{Request, Response};
use crate::error::ServerError;
use crate::lifecycle::Shutdown;

/// HTTP front end for an `App`.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(app: Arc<App>) -> Self {
        let config = app.config();
        let router = Self::build_router(&config, app);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, app: Arc<App>) -> Router {
        Router::new()
            .fallback(serve_request)
            .with_state(app)
            .layer(RequestBodyLimitLayer::new(config.server.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static("switchyard"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, e.g. for driving with `tower::ServiceExt`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` is triggered, then drain in-flight
    /// requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: buffer the body, run the app off the async workers,
/// convert the result.
async fn serve_request(
    State(app): State<Arc<App>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let limit = app.config().server.max_body_size;

    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let request = Request::from_parts(&parts, bytes, false);
    match tokio::task::spawn_blocking(move || app.serve(request)).await {
        Ok(response) => into_http(response),
        Err(e) => {
            tracing::error!(error = %e, "Request task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn into_http(response: Response) -> axum::response::Response {
    let (status, headers, body) = response.into_parts();
    let mut out = axum::response::Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::routing::DirRouter;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_bridges_to_app() {
        let app = App::new(AppConfig::default());
        app.router("main")
            .register_fn("^/ping$", |ctx: &mut Context| ctx.write("pong"))
            .unwrap();

        let response = HttpServer::new(app)
            .router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()[header::SERVER], "switchyard");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_routers_see_decoded_path() {
        let app = App::new(AppConfig::default());
        let dir = DirRouter::new();
        dir.register_fn("café", |ctx: &mut Context| ctx.write("coffee"))
            .unwrap();
        app.router("main")
            .register_fn("^/user/(?P<name>[^/]+)$", |ctx: &mut Context| {
                let name = ctx.captures().get("name").unwrap_or_default().to_string();
                ctx.write(name);
            })
            .unwrap()
            .register("^/d", dir)
            .unwrap();
        let router = HttpServer::new(app).router();

        for (uri, expected) in [("/user/john%20doe", "john doe"), ("/d/caf%C3%A9", "coffee")] {
            let response = router
                .clone()
                .oneshot(
                    axum::http::Request::builder()
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], expected.as_bytes());
        }
    }
}
