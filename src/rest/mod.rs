// rest/mod.rs — Public REST API server.
//
// Axum HTTP server the landing page talks to (local port unless bound wider).
//
// Endpoints:
//   POST /waitlist   — join the waitlist
//   GET  /waitlist   — full listing, most recent first
//   GET  /health     — liveness

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/health", get(routes::health::health))
        // Waitlist
        .route(
            "/waitlist",
            post(routes::waitlist::join).get(routes::waitlist::list),
        )
        // The signup form posts from the browser; allow cross-origin calls.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
