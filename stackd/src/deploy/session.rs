//! Registry credential session
//!
//! The compose control path reads registry credentials from a single docker config
//! directory shared by every deployment. Logging in, deploying and logging out therefore
//! happen inside one process-wide exclusive section.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::deploy::command::{self, CommandError};
use crate::errors::StackError;
use crate::filesys::file::File;
use crate::models::endpoint::Endpoint;
use crate::models::registry::{DockerHub, Registry};

/// Server name used for the default registry
pub const DOCKER_HUB_SERVER: &str = "docker.io";

#[async_trait]
pub trait RegistryAuthenticator: Send + Sync {
    async fn login(
        &self,
        server: &str,
        username: &str,
        password: &SecretString,
        endpoint: &Endpoint,
    ) -> Result<(), CommandError>;

    async fn logout(&self, endpoint: &Endpoint) -> Result<(), CommandError>;
}

/// Authenticates with `docker login`, storing credentials in a private config directory
#[derive(Debug, Clone)]
pub struct DockerCliRegistryAuthenticator {
    binary: PathBuf,
    config_dir: PathBuf,
    timeout: Duration,
}

impl DockerCliRegistryAuthenticator {
    pub fn new(binary: impl Into<PathBuf>, config_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            config_dir: config_dir.into(),
            timeout,
        }
    }

    fn config_file(&self) -> File {
        File::new(self.config_dir.join("config.json"))
    }
}

#[async_trait]
impl RegistryAuthenticator for DockerCliRegistryAuthenticator {
    async fn login(
        &self,
        server: &str,
        username: &str,
        password: &SecretString,
        endpoint: &Endpoint,
    ) -> Result<(), CommandError> {
        debug!("Logging in to registry {} as {}", server, username);

        let mut cmd = Command::new(&self.binary);
        if !endpoint.url.is_empty() {
            cmd.args(["--host", endpoint.url.as_str()]);
        }
        cmd.args(["login", server, "--username", username, "--password-stdin"])
            .env("DOCKER_CONFIG", &self.config_dir);

        command::run(cmd, Some(password.expose_secret().as_bytes()), self.timeout).await?;
        Ok(())
    }

    /// Clearing the config file drops every stored credential at once
    async fn logout(&self, _endpoint: &Endpoint) -> Result<(), CommandError> {
        let file = self.config_file();
        file.delete().await.map_err(|source| CommandError::Spawn {
            program: format!("logout ({:?})", file.path()),
            source,
        })
    }
}

/// Serializes login, deploy and logout across all deployments
pub struct CredentialSession {
    lock: Mutex<()>,
    authenticator: Arc<dyn RegistryAuthenticator>,
}

impl CredentialSession {
    pub fn new(authenticator: Arc<dyn RegistryAuthenticator>) -> Self {
        Self {
            lock: Mutex::new(()),
            authenticator,
        }
    }

    /// Run `deploy` with every usable registry logged in.
    ///
    /// Logins are best effort. Logout always runs; when it fails after `deploy` failed, the
    /// logout error is attached to the deployment error instead of replacing it.
    pub async fn run<F, Fut, T>(
        &self,
        docker_hub: &DockerHub,
        registries: &[Registry],
        endpoint: &Endpoint,
        deploy: F,
    ) -> Result<T, StackError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, StackError>> + Send,
        T: Send,
    {
        let _section = self.lock.lock().await;
        debug!("Acquired credential session for endpoint {}", endpoint.id);

        self.login_all(docker_hub, registries, endpoint).await;

        let result = deploy().await;
        let logout = self.authenticator.logout(endpoint).await;

        match (result, logout) {
            (result, Ok(())) => result,
            (Ok(_), Err(e)) => Err(StackError::deployment(format!(
                "Unable to logout from registries: {}",
                e
            ))),
            (Err(StackError::Deployment { cause, .. }), Err(e)) => Err(StackError::Deployment {
                cause,
                secondary: Some(e.to_string()),
            }),
            (Err(err), Err(e)) => {
                warn!("Registry logout failed after deployment error: {}", e);
                Err(err)
            }
        }
    }

    async fn login_all(&self, docker_hub: &DockerHub, registries: &[Registry], endpoint: &Endpoint) {
        for registry in registries.iter().filter(|r| r.authentication) {
            let password = SecretString::from(registry.password.clone());
            if let Err(e) = self
                .authenticator
                .login(&registry.url, &registry.username, &password, endpoint)
                .await
            {
                warn!("Unable to login to registry {}: {}", registry.name, e);
            }
        }

        if docker_hub.authentication {
            let password = SecretString::from(docker_hub.password.clone());
            if let Err(e) = self
                .authenticator
                .login(DOCKER_HUB_SERVER, &docker_hub.username, &password, endpoint)
                .await
            {
                warn!("Unable to login to the default registry: {}", e);
            }
        }

        info!(
            "Registry credentials prepared for endpoint {} ({} registries)",
            endpoint.id,
            registries.iter().filter(|r| r.authentication).count()
        );
    }
}
