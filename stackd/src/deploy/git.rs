//! Git repository clone

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::deploy::command::{self, CommandError};

/// Basic authentication for a repository
#[derive(Debug)]
pub struct RepositoryCredentials {
    pub username: String,
    pub password: SecretString,
}

impl Clone for RepositoryCredentials {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_string()),
        }
    }
}

#[derive(Debug)]
pub struct CloneParameters<'a> {
    pub url: &'a str,
    /// Branch or tag, empty for the remote's default branch
    pub reference_name: &'a str,
    pub destination: &'a Path,
    pub credentials: Option<&'a RepositoryCredentials>,
}

#[derive(Error, Debug)]
pub enum CloneError {
    #[error("Invalid repository URL {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[async_trait]
pub trait RepositoryCloner: Send + Sync {
    async fn clone_repository(&self, params: CloneParameters<'_>) -> Result<(), CloneError>;
}

/// Clones with the `git` binary
#[derive(Debug, Clone)]
pub struct GitCliCloner {
    binary: PathBuf,
    timeout: Duration,
}

impl GitCliCloner {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

// read back by the credential helper below
const USERNAME_ENV: &str = "STACKD_GIT_USERNAME";
const PASSWORD_ENV: &str = "STACKD_GIT_PASSWORD";

/// Inline helper answering `get` from the environment. Nothing is written to the
/// repository's `.git/config` and the command line carries no secret.
const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get && printf 'username=%s\\npassword=%s\\n' \"$STACKD_GIT_USERNAME\" \"$STACKD_GIT_PASSWORD\"; }; f";

impl GitCliCloner {
    fn command(&self, params: &CloneParameters<'_>) -> Result<Command, CloneError> {
        let remote =
            Url::parse(params.url).map_err(|_| CloneError::InvalidUrl(redact_url(params.url)))?;
        let branch = branch_name(params.reference_name);

        let mut cmd = Command::new(&self.binary);
        cmd.args(["clone", "--depth", "1"]);
        if !branch.is_empty() {
            cmd.args(["--branch", branch]);
        }
        cmd.arg(remote.as_str())
            .arg(params.destination)
            .env("GIT_TERMINAL_PROMPT", "0");

        if let Some(credentials) = params.credentials {
            // the empty helper drops any helper inherited from the user's git config
            cmd.envs([
                ("GIT_CONFIG_COUNT", "2"),
                ("GIT_CONFIG_KEY_0", "credential.helper"),
                ("GIT_CONFIG_VALUE_0", ""),
                ("GIT_CONFIG_KEY_1", "credential.helper"),
                ("GIT_CONFIG_VALUE_1", CREDENTIAL_HELPER),
                (USERNAME_ENV, credentials.username.as_str()),
                (PASSWORD_ENV, credentials.password.expose_secret()),
            ]);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl RepositoryCloner for GitCliCloner {
    async fn clone_repository(&self, params: CloneParameters<'_>) -> Result<(), CloneError> {
        let cmd = self.command(&params)?;
        let branch = branch_name(params.reference_name);

        info!(
            "Cloning {} (reference: {}) to {:?}",
            redact_url(params.url),
            if branch.is_empty() { "default" } else { branch },
            params.destination
        );

        command::run(cmd, None, self.timeout)
            .await
            .map_err(|e| scrub(e, params.credentials))?;

        debug!("Clone of {} completed", redact_url(params.url));
        Ok(())
    }
}

/// Strip the `refs/heads/` or `refs/tags/` prefix git's `--branch` does not accept
pub fn branch_name(reference_name: &str) -> &str {
    reference_name
        .strip_prefix("refs/heads/")
        .or_else(|| reference_name.strip_prefix("refs/tags/"))
        .unwrap_or(reference_name)
}

/// URL without its userinfo, for logs and error messages
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

fn scrub(err: CommandError, credentials: Option<&RepositoryCredentials>) -> CommandError {
    let secret = credentials
        .map(|c| c.password.expose_secret().to_string())
        .filter(|s| !s.is_empty());
    match (err, secret) {
        (
            CommandError::Failed {
                program,
                status,
                stderr,
            },
            Some(secret),
        ) => CommandError::Failed {
            program,
            status,
            stderr: stderr.replace(&secret, "***"),
        },
        (err, _) => err,
    }
}
