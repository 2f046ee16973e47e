//! Switchyard demo server.
//!
//! ```text
//!   Client ──▶ axum + tower-http ──▶ App::serve
//!                                      │
//!                     ┌────────────────┼─────────────────┐
//!                     ▼                ▼                 ▼
//!              "main" middleware   session store    default view
//!                                                       │
//!                                      "app" middleware + router "main"
//!                                                       │
//!                                  regex / dir / host routers → handlers
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use switchyard::config::watcher::ConfigWatcher;
use switchyard::config::{load_config, AppConfig};
use switchyard::dispatch::{Controller, ProtocolController};
use switchyard::error::{CaptureError, RouteError};
use switchyard::lifecycle::signals::spawn_signal_handler;
use switchyard::middleware::AccessLog;
use switchyard::observability::{init_logging, metrics};
use switchyard::routing::{DirRouter, Handler};
use switchyard::session::{self, SessionMap};
use switchyard::{App, Context, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Request routing and dispatch demo server", long_about = None)]
struct Cli {
    /// TOML config file. Defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Force debug mode on.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    config.debug |= cli.debug;

    init_logging(&config.observability);
    tracing::info!(
        name = %config.name,
        bind_address = %config.server.bind_address,
        debug = config.debug,
        session_store = ?config.session.store,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let bind_address = config.server.bind_address.clone();
    let app = App::new(config.clone());
    app.set_session_store(session::from_config(&config.session, Some(shutdown.clone())));
    register_routes(&app)?;

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let app = app.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(new_config) => app.reload_config(new_config),
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let listener = TcpListener::bind(&bind_address).await?;
    HttpServer::new(app).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_routes(app: &Arc<App>) -> Result<(), RouteError> {
    app.middlewares(switchyard::app::MAIN).register::<AccessLog>();

    let blog = DirRouter::new();
    blog.root(Handler::func(|ctx: &mut Context| ctx.write("All posts")));
    blog.pattern(r"^(?P<id>\d+)$")?.asterisk(Handler::controller::<Post>());

    let main = app.router(switchyard::app::MAIN);
    main.register("^/$", Handler::controller::<Home>())?
        .register_fn(r"^/hello/(?P<name>[A-Za-z]+)/?$", |ctx: &mut Context| {
            let name = ctx.captures().get("name").unwrap_or("stranger").to_string();
            ctx.write(format!("Hello, {name}!"));
        })?
        .register("^/blog", blog)?
        .register("^/secure/?$", Handler::protocol::<SecureArea>())?
        .register_fn("^/visits/?$", visits)?
        .register_fn("^/logout/?$", |ctx: &mut Context| {
            if let Err(e) = ctx.destroy_session() {
                tracing::warn!(error = %e, "Failed to destroy session");
            }
            ctx.write("Logged out");
        })?;
    Ok(())
}

fn visits(ctx: &mut Context) {
    let mut session = SessionMap::load(ctx);
    let count = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    session.set("visits", count);
    if let Err(e) = session.save(ctx) {
        tracing::warn!(error = %e, "Failed to save session");
        ctx.internal_error();
        return;
    }
    ctx.write(format!("Visits: {count}"));
}

#[derive(Default)]
struct Home;

impl Controller for Home {
    fn get(&mut self, ctx: &mut Context) {
        ctx.write("Welcome to switchyard");
    }
}

#[derive(Default)]
struct Post {
    id: u64,
}

impl Controller for Post {
    fn bind(&mut self, ctx: &Context) -> Result<(), CaptureError> {
        self.id = ctx.captures().get_uint("id")?;
        Ok(())
    }

    fn get(&mut self, ctx: &mut Context) {
        ctx.write(format!("Post #{}", self.id));
    }
}

#[derive(Default)]
struct SecureArea;

impl ProtocolController for SecureArea {
    fn http(&mut self, ctx: &mut Context) {
        ctx.forbidden();
    }

    fn https(&mut self, ctx: &mut Context) {
        ctx.write("Secure area");
    }
}
