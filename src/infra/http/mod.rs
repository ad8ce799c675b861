//! HTTP caller layer over the user mapper.

mod handlers;
mod middleware;
mod state;

pub use middleware::RequestContext;
pub use state::HttpState;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerSettings;

use super::error::InfraError;
use middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/{id}", get(handlers::get_user))
        .route("/api/users/updateAll", post(handlers::update_all))
        .route("/api/users/updateOne", post(handlers::update_one))
        .route("/api/users/deleteAll", post(handlers::delete_all))
        .route("/api/users/cache/l1", get(handlers::session_cache_users))
        .route("/api/cache/l1/{id}", get(handlers::session_cache_user))
        .route("/api/cache/l2/{id}", get(handlers::namespace_cache_user))
        .route("/api/cache/evict", post(handlers::evict))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Serve until Ctrl-C.
pub async fn serve(settings: &ServerSettings, state: HttpState) -> Result<(), InfraError> {
    let listener = TcpListener::bind(settings.addr).await?;
    info!(
        target: "mapperlab::http",
        addr = %settings.addr,
        "HTTP listener ready"
    );

    axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(target: "mapperlab::http", "Shutdown signal received");
    }
}
