//! Deployment engine

use std::sync::Arc;

use tracing::{debug, info};

use crate::authn::access::is_admin_or_endpoint_admin;
use crate::authn::context::RestrictedRequestContext;
use crate::deploy::compose::ComposeStackManager;
use crate::deploy::policy::validate_stack_file;
use crate::deploy::session::CredentialSession;
use crate::errors::StackError;
use crate::filesys::project::ProjectStore;
use crate::models::endpoint::Endpoint;
use crate::models::registry::{DockerHub, Registry};
use crate::models::stack::Stack;
use crate::models::user::User;

/// Per-request deployment inputs, assembled once the stack files exist
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub stack: Stack,
    pub endpoint: Endpoint,
    pub docker_hub: DockerHub,
    /// Registries visible to the acting user
    pub registries: Vec<Registry>,
    pub context: RestrictedRequestContext,
    pub user: User,
}

impl DeploymentConfig {
    pub fn is_admin(&self) -> bool {
        self.context.is_admin
    }
}

pub struct DeploymentEngine {
    projects: Arc<dyn ProjectStore>,
    compose: Arc<dyn ComposeStackManager>,
    session: CredentialSession,
}

impl DeploymentEngine {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        compose: Arc<dyn ComposeStackManager>,
        session: CredentialSession,
    ) -> Self {
        Self {
            projects,
            compose,
            session,
        }
    }

    /// Check the stack file against the endpoint security settings. Administrators and
    /// endpoint administrators are not restricted.
    pub async fn check_policy(&self, config: &DeploymentConfig) -> Result<(), StackError> {
        let settings = &config.endpoint.security_settings;
        if !settings.restricts_anything() {
            return Ok(());
        }
        if is_admin_or_endpoint_admin(&config.context, &config.endpoint) {
            debug!("Security settings do not apply to user {}", config.user.username);
            return Ok(());
        }

        let path = config.stack.entry_point_path();
        let content = self
            .projects
            .file_content(&path)
            .await
            .map_err(|e| StackError::storage("Unable to read stack file", e))?;

        validate_stack_file(&content, settings)
    }

    /// Bring the stack up inside the credential session
    pub async fn deploy(&self, config: &DeploymentConfig) -> Result<(), StackError> {
        let compose = self.compose.clone();
        let stack = &config.stack;
        let endpoint = &config.endpoint;

        self.session
            .run(&config.docker_hub, &config.registries, endpoint, || async move {
                compose
                    .up(stack, endpoint)
                    .await
                    .map_err(StackError::deployment)
            })
            .await?;

        info!("Stack {} deployed on endpoint {}", stack.name, endpoint.id);
        Ok(())
    }
}
