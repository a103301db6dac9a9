//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::datastore::UserStore;
use crate::errors::StackError;
use crate::models::user::UserId;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Serve the API until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StackError> {
    info!("Initializing stackd...");

    let app_state = AppState::init(&options).await?;
    let server_state = ServerState::new(
        app_state.orchestrator.clone(),
        app_state.store.clone(),
        app_state.tokens.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), shutdown_signal).await?;

    let result = match server_handle.await {
        Ok(result) => result,
        Err(e) => Err(StackError::Internal(format!("HTTP server task failed: {}", e))),
    };
    if let Err(e) = &result {
        error!("HTTP server stopped with an error: {}", e);
    }

    info!("stackd stopped");
    result
}

/// Sign an access token for an existing user
pub async fn issue_token(options: &AppOptions, user_id: UserId) -> Result<String, StackError> {
    let app_state = AppState::init(options).await?;
    let user = app_state.store.user(user_id).await.map_err(|e| {
        if e.is_not_found() {
            StackError::NotFound(format!("User {} not found", user_id))
        } else {
            StackError::persistence("Unable to load user information from the database", e)
        }
    })?;
    app_state.tokens.issue(&user)
}
