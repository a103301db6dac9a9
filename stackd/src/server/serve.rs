//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::StackError;
use crate::server::handlers::{
    create_stack_handler, inspect_stack_handler, list_stacks_handler, status_handler,
    version_handler,
};
use crate::server::state::ServerState;

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // System
        .route("/api/system/status", get(status_handler))
        .route("/api/system/version", get(version_handler))
        // Stacks
        .route(
            "/api/stacks",
            post(create_stack_handler).get(list_stacks_handler),
        )
        .route("/api/stacks/{id}", get(inspect_stack_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), StackError>>, StackError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| StackError::Internal(format!("Unable to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| StackError::Internal(e.to_string()))
    });

    Ok(handle)
}
