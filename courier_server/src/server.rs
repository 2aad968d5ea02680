use crate::routes;
use axum::{Extension, Router};
use courier_core::{BulkRefresher, LetterTracker};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<LetterTracker>,
    pub refresher: Arc<BulkRefresher>,
}

impl AppState {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(tracker: Arc<LetterTracker>, refresher: Arc<BulkRefresher>) -> Self {
        Self { tracker, refresher }
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(Extension(Arc::new(state)))
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Serve until SIGINT/SIGTERM, then drain the bulk refresher.
#[tracing::instrument(level = "info", skip_all, fields(%addr))]
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    drain_timeout: Duration,
) -> anyhow::Result<()> {
    let refresher = state.refresher.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "courier listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !refresher.shutdown(drain_timeout).await {
        tracing::warn!(
            drain_timeout_ms = drain_timeout.as_millis() as u64,
            "exiting with refresh tasks still running"
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
