//! Docker Compose control path

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::deploy::command::{self, CommandError};
use crate::models::endpoint::Endpoint;
use crate::models::stack::Stack;

#[async_trait]
pub trait ComposeStackManager: Send + Sync {
    /// Bring every service of the stack up on the endpoint
    async fn up(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), CommandError>;
}

/// Runs `docker compose`, falling back to the standalone `docker-compose` binary
#[derive(Debug, Clone)]
pub struct DockerComposeManager {
    docker_binary: PathBuf,
    standalone_binary: PathBuf,
    config_dir: PathBuf,
    timeout: Duration,
}

impl DockerComposeManager {
    pub fn new(
        docker_binary: impl Into<PathBuf>,
        standalone_binary: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            docker_binary: docker_binary.into(),
            standalone_binary: standalone_binary.into(),
            config_dir: config_dir.into(),
            timeout,
        }
    }

    fn command(&self, binary: &Path, plugin: bool, stack: &Stack, endpoint: &Endpoint) -> Command {
        let mut cmd = Command::new(binary);
        if !endpoint.url.is_empty() {
            cmd.args(["--host", endpoint.url.as_str()]);
        }
        if plugin {
            cmd.arg("compose");
        }
        cmd.args(["-p", stack.name.as_str(), "-f", stack.entry_point.as_str(), "up", "-d"])
            .current_dir(&stack.project_path)
            .env("DOCKER_CONFIG", &self.config_dir)
            .envs(stack.env.iter().map(|pair| (&pair.name, &pair.value)));
        cmd
    }
}

/// The docker CLI is present but was built without the compose plugin
fn plugin_missing(err: &CommandError) -> bool {
    err.is_spawn_failure()
        || err
            .stderr()
            .is_some_and(|stderr| {
                stderr.contains("is not a docker command") || stderr.contains("unknown command")
            })
}

#[async_trait]
impl ComposeStackManager for DockerComposeManager {
    async fn up(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), CommandError> {
        info!(
            "Deploying stack {} ({}) on endpoint {}",
            stack.name, stack.entry_point, endpoint.id
        );

        let plugin = self.command(&self.docker_binary, true, stack, endpoint);
        match command::run(plugin, None, self.timeout).await {
            Ok(_) => {}
            Err(e) if plugin_missing(&e) => {
                warn!("docker compose unavailable ({}), trying {:?}", e, self.standalone_binary);
                let standalone = self.command(&self.standalone_binary, false, stack, endpoint);
                command::run(standalone, None, self.timeout).await?;
            }
            Err(e) => return Err(e),
        }

        debug!("Stack {} is up", stack.name);
        Ok(())
    }
}
