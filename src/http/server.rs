//! HTTP server setup and connection draining.
//!
//! # Responsibilities
//! - Compose the router: health endpoints, request gate, business routes
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve HTTP/1.1 and HTTP/2 connections from the bounded listener
//! - Stop accepting, drain and force-close on request from shutdown
//!
//! # Design Decisions
//! - The accept loop is hand-rolled over hyper-util so each connection can
//!   be told to finish gracefully and later be dropped
//! - `/live` and `/ready` sit outside the gate so orchestrators can watch
//!   the drain; everything else is gated

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::ConnectInfo,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, TimeoutConfig};
use crate::http::endpoints::{self, EndpointState};
use crate::http::gate::request_gate;
use crate::lifecycle::{DrainReport, DrainTarget};
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};

/// Build the service router around the collaborator's business routes.
#[allow(deprecated)]
pub fn build_router(business: Router, endpoints: EndpointState, timeouts: &TimeoutConfig) -> Router {
    let gate = middleware::from_fn_with_state(endpoints.shutdown.clone(), request_gate);

    let gated = Router::new()
        .route("/health", get(endpoints::health))
        .with_state(endpoints.clone())
        .merge(business)
        .layer(gate);

    Router::new()
        .route("/live", get(endpoints::live))
        .route("/ready", get(endpoints::ready))
        .with_state(endpoints)
        .merge(gated)
        .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// HTTP server over the bounded listener.
pub struct HttpServer {
    listener: Listener,
    router: Router,
    tracker: ConnectionTracker,
    stop: Arc<watch::Sender<bool>>,
    force: Arc<watch::Sender<bool>>,
}

impl HttpServer {
    pub async fn bind(config: &ListenerConfig, router: Router) -> Result<Self, ListenerError> {
        let listener = Listener::bind(config).await?;
        let (stop, _) = watch::channel(false);
        let (force, _) = watch::channel(false);
        Ok(Self {
            listener,
            router,
            tracker: ConnectionTracker::new(),
            stop: Arc::new(stop),
            force: Arc::new(force),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Handle used by shutdown to stop and drain this server.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            stop: Arc::clone(&self.stop),
            force: Arc::clone(&self.force),
            tracker: self.tracker.clone(),
        }
    }

    /// Accept connections until told to stop. Returns once the listening
    /// socket is closed; open connections keep running in their own tasks.
    pub async fn run(self) -> Result<(), ListenerError> {
        let addr = self.listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop_rx = self.stop.subscribe();
        loop {
            let accepted = tokio::select! {
                _ = signalled(&mut stop_rx) => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            address = %addr,
            open_connections = self.tracker.active_count(),
            "HTTP server stopped accepting"
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let router = self.router.clone();
        let mut stop_rx = self.stop.subscribe();
        let mut force_rx = self.force.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            let id = guard.id();
            tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection opened");

            let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer));
                router.clone().oneshot(req)
            });
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = signalled(&mut stop_rx) => {
                    conn.as_mut().graceful_shutdown();
                    tokio::select! {
                        result = conn.as_mut() => result,
                        _ = signalled(&mut force_rx) => {
                            tracing::debug!(connection_id = %id, "Connection force-closed");
                            Ok(())
                        }
                    }
                }
            };

            if let Err(e) = result {
                tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
            }
            drop(guard);
        });
    }
}

/// Stops and drains an [`HttpServer`] from another task.
#[derive(Clone)]
pub struct ServerHandle {
    stop: Arc<watch::Sender<bool>>,
    force: Arc<watch::Sender<bool>>,
    tracker: ConnectionTracker,
}

impl ServerHandle {
    pub fn open_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

#[async_trait]
impl DrainTarget for ServerHandle {
    fn stop_accepting(&self) {
        self.stop.send_replace(true);
    }

    async fn drain(&self, grace: Duration) -> DrainReport {
        let in_flight = self.tracker.active_count();
        if tokio::time::timeout(grace, self.tracker.wait_idle()).await.is_ok() {
            return DrainReport {
                in_flight,
                forced: 0,
            };
        }

        let forced = self.tracker.active_count();
        self.force.send_replace(true);
        self.tracker.wait_idle().await;
        DrainReport { in_flight, forced }
    }
}

/// Resolve once the flag is set. Pends forever if every sender is gone.
async fn signalled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|set| *set).await.is_err() {
        std::future::pending::<()>().await;
    }
}
