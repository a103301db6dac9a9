//! Application state

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::app::options::AppOptions;
use crate::authn::token::TokenService;
use crate::datastore::json::JsonDataStore;
use crate::datastore::DataStore;
use crate::deploy::compose::DockerComposeManager;
use crate::deploy::engine::DeploymentEngine;
use crate::deploy::git::GitCliCloner;
use crate::deploy::orchestrator::StackOrchestrator;
use crate::deploy::session::{CredentialSession, DockerCliRegistryAuthenticator};
use crate::deploy::source::SourceResolver;
use crate::errors::StackError;
use crate::filesys::project::{FsProjectStore, ProjectStore};
use crate::storage::layout::StorageLayout;
use crate::utils::generate_secret;

/// Long-lived services shared by every request
pub struct AppState {
    pub store: Arc<JsonDataStore>,
    pub orchestrator: Arc<StackOrchestrator>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub async fn init(options: &AppOptions) -> Result<Self, StackError> {
        let layout = &options.storage.layout;
        layout.setup().await.map_err(|e| {
            StackError::storage(format!("Unable to create data directory {:?}", layout.base_dir), e)
        })?;

        let database_file = layout.database_file();
        let store = Arc::new(JsonDataStore::open(database_file.path()).await.map_err(|e| {
            StackError::persistence(format!("Unable to open {:?}", database_file.path()), e)
        })?);
        info!("Metadata store opened at {:?}", database_file.path());

        let stored;
        let secret = match &options.auth.jwt_secret {
            Some(secret) => secret,
            None => {
                stored = stored_secret(layout).await?;
                &stored
            }
        };
        let tokens = Arc::new(TokenService::new(
            secret,
            chrono::Duration::from_std(options.auth.token_ttl)
                .map_err(|e| StackError::Internal(format!("Invalid token lifetime: {}", e)))?,
        ));

        let orchestrator = Arc::new(build_orchestrator(options, store.clone()));

        Ok(Self {
            store,
            orchestrator,
            tokens,
        })
    }
}

/// Token signing secret kept in the data directory, created on first use
async fn stored_secret(layout: &StorageLayout) -> Result<SecretString, StackError> {
    let file = layout.secret_file();
    if file.exists().await {
        let raw = file
            .read_bytes()
            .await
            .map_err(|e| StackError::storage("Unable to read token secret", e))?;
        let secret = String::from_utf8_lossy(&raw).trim().to_string();
        if !secret.is_empty() {
            return Ok(SecretString::from(secret));
        }
    }

    let secret = generate_secret();
    file.write_bytes(secret.as_bytes())
        .await
        .map_err(|e| StackError::storage("Unable to store token secret", e))?;
    info!("Generated token signing secret at {:?}", file.path());
    Ok(SecretString::from(secret))
}

fn build_orchestrator(options: &AppOptions, store: Arc<JsonDataStore>) -> StackOrchestrator {
    let layout = &options.storage.layout;
    let deploy = &options.deploy;

    let projects: Arc<dyn ProjectStore> = Arc::new(FsProjectStore::new(layout.compose_dir()));
    let cloner = Arc::new(GitCliCloner::new(&deploy.git_binary, deploy.clone_timeout));
    let compose = Arc::new(DockerComposeManager::new(
        &deploy.docker_binary,
        &deploy.compose_binary,
        layout.docker_config_dir(),
        deploy.compose_timeout,
    ));
    let authenticator = Arc::new(DockerCliRegistryAuthenticator::new(
        &deploy.docker_binary,
        layout.docker_config_dir(),
        deploy.login_timeout,
    ));

    let resolver = SourceResolver::new(projects.clone(), cloner);
    let engine = DeploymentEngine::new(
        projects.clone(),
        compose,
        CredentialSession::new(authenticator),
    );

    let store: Arc<dyn DataStore> = store;
    StackOrchestrator::new(store, projects, resolver, engine)
}
