pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use geotrack_core::Tracker;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(tracker: Arc<Tracker>) -> Router {
    let app_state = state::AppState::new(tracker);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Status
        .route("/api/health", get(routes::status::health))
        .route("/api/status", get(routes::status::get_status))
        // Auto-update
        .route("/api/auto-update/start", post(routes::auto_update::start))
        .route("/api/auto-update/stop", post(routes::auto_update::stop))
        .route("/api/refresh", post(routes::refresh::refresh))
        // Snapshot
        .route("/api/locations", get(routes::locations::get_locations))
        .route("/api/geojson", get(routes::locations::get_geojson))
        .route("/api/devices", get(routes::devices::list_devices))
        // Exports
        .route("/api/export/current", post(routes::exports::export_current))
        .route("/api/export/history", post(routes::exports::export_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the geotrack API server on `port`.
pub async fn serve(tracker: Arc<Tracker>, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(tracker, listener, open_browser).await
}

/// Start the geotrack API server on a pre-bound listener.
///
/// Runs until Ctrl-C, then stops auto-update so no new cycle starts. An
/// in-flight cycle is left to finish on the runtime.
pub async fn serve_on(
    tracker: Arc<Tracker>,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(Arc::clone(&tracker));

    tracing::info!("geotrack API listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}/api/status");
        let _ = open::that(&url);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracker.stop_auto_update();
    tracing::info!("geotrack API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
