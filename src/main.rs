//! estate-lifecycle
//!
//! Runs the marketplace API's lifecycle shell: health endpoints, request
//! gate and graceful shutdown around the business routes.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::Listener ──▶ http::server ──┬─▶ /live, /ready
//!                                                      └─▶ gate ──▶ /health, business routes
//!
//!     SIGTERM / SIGINT / panic / task failure
//!     ──────────────▶ ShutdownTrigger ──▶ ShutdownCoordinator
//!                       (gate closes)      stop accept → drain → cleanup
//!                                          → disconnect resources → exit
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;

use estate_lifecycle::config::{load_config, ServiceConfig};
use estate_lifecycle::http::{build_router, EndpointState, HttpServer};
use estate_lifecycle::lifecycle::signals::{install_panic_hook, spawn_signal_listener, supervise};
use estate_lifecycle::lifecycle::{startup, ShutdownCoordinator, ShutdownState, StdProcessExit};
use estate_lifecycle::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "estate-lifecycle", version)]
#[command(about = "Health endpoints and graceful shutdown for the marketplace API", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("estate-lifecycle: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("estate-lifecycle: failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{e:#}"), "Start-up failed");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "estate-lifecycle starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_deadline_ms = config.shutdown.deadline_ms,
        drain_grace_ms = config.shutdown.drain_grace_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let services = startup::initialize(&config)?;
    let state = ShutdownState::new();

    let endpoints = EndpointState {
        aggregator: services.aggregator.clone(),
        shutdown: state.clone(),
        ready_when_degraded: config.health.ready_when_degraded,
    };
    let router = build_router(Router::new(), endpoints, &config.timeouts);
    let server = HttpServer::bind(&config.listener, router).await?;
    tracing::info!(address = %server.local_addr()?, "Listening for connections");

    let mut coordinator =
        ShutdownCoordinator::new(state, &config.shutdown, Arc::new(StdProcessExit));
    coordinator.set_drain_target(Arc::new(server.handle()));
    for task in services.cleanup {
        coordinator.register_cleanup(task);
    }
    for resource in services.resources {
        coordinator.register_resource(resource);
    }

    let trigger = coordinator.trigger();
    install_panic_hook(trigger.clone());
    spawn_signal_listener(trigger.clone())?;
    supervise("http-server", tokio::spawn(server.run()), trigger);

    let outcome = coordinator.run().await;
    tracing::info!(outcome = outcome.as_str(), "Shutdown complete");
    Ok(())
}
