use std::net::SocketAddr;
use std::path::Path;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use huddle_store::TaskStore;

use crate::config::ServerConfig;
use crate::relay::{Relay, StatsSnapshot};
use crate::tasks;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskStore,
    pub relay: Relay,
    pub started_at: DateTime<Utc>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/tasks/{id}",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    tasks: TaskStore,
    shutdown: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let (relay, hub) = Relay::start(&config.relay_config(), shutdown.clone());

    let state = AppState {
        tasks,
        relay: relay.clone(),
        started_at: Utc::now(),
    };
    let router = build_router(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        addr = %local_addr,
        static_dir = ?config.static_dir,
        inbound_capacity = config.inbound_capacity,
        "huddle server started"
    );

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "http server exited with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        relay,
        shutdown,
        server,
        hub,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    addr: SocketAddr,
    relay: Relay,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    hub: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Stop accepting requests, stop the relay and close every chat connection.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.relay.shutdown().await;
        if let Err(e) = self.hub.await {
            tracing::warn!(error = %e, "broadcast hub task failed");
        }
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "http server task failed");
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_failed_upgrade(|error| {
        tracing::warn!(error = %error, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        state.relay.accept(socket);
    })
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    connections: usize,
    #[serde(flatten)]
    relay: StatsSnapshot,
    tasks: usize,
    started_at: String,
    uptime_secs: i64,
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReport {
        status: "healthy",
        connections: state.relay.connection_count(),
        relay: state.relay.stats(),
        tasks: state.tasks.len(),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
