pub mod handlers;
pub mod ws;

use anyhow::Context;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::ApiState;

/// Every route the relay serves.
pub fn router(state: ApiState) -> Router {
    let client_routes = Router::new()
        .route("/offer", post(handlers::client::handle_offer))
        .route("/candidate", post(handlers::client::handle_candidate))
        .route(
            "/candidates/{peer_id}",
            get(handlers::client::handle_take_candidates),
        )
        .route("/peers/{peer_id}", delete(handlers::client::handle_peer_close))
        .route("/ice-servers", get(handlers::client::handle_ice_servers))
        .route("/ws", get(ws::handle_client_ws));

    let api_routes = Router::new()
        .route("/status", get(handlers::status::handle_status))
        .route("/peers", get(handlers::status::handle_peers));

    Router::new()
        .nest("/client", client_routes)
        .nest("/api", api_routes)
        .route("/ws", get(ws::handle_resource_ws))
        .route("/health", get(handlers::status::handle_health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: ApiState, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind_addr, port))
        .await
        .with_context(|| format!("binding {bind_addr}:{port}"))?;
    serve_on(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: tokio::net::TcpListener, state: ApiState) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "signaling relay listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
