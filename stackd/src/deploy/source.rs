//! Stack sources and their materialization into project storage

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use stackd_api::{ComposeStackFromFileContentPayload, ComposeStackFromGitRepositoryPayload};
use tracing::{debug, error, info};
use url::Url;

use crate::deploy::git::{redact_url, CloneParameters, RepositoryCloner, RepositoryCredentials};
use crate::errors::StackError;
use crate::filesys::project::ProjectStore;
use crate::models::stack::{GitConfig, Pair, StackId, COMPOSE_FILE_DEFAULT_NAME};

/// Where a repository-sourced stack comes from
#[derive(Debug, Clone)]
pub struct RepositoryDescriptor {
    pub url: String,
    pub reference_name: String,
    pub credentials: Option<RepositoryCredentials>,
    /// Repository-relative path of the compose file
    pub compose_file_path: String,
}

/// Origin of a stack's compose file
#[derive(Debug, Clone)]
pub enum StackSource {
    InlineContent(String),
    UploadedBytes(Vec<u8>),
    Repository(RepositoryDescriptor),
}

/// Everything needed to create a compose stack
#[derive(Debug, Clone)]
pub struct CreateComposeStackRequest {
    pub name: String,
    pub env: Vec<Pair>,
    pub source: StackSource,
}

impl CreateComposeStackRequest {
    pub fn from_file_content(payload: ComposeStackFromFileContentPayload) -> Self {
        Self {
            name: payload.name,
            env: payload.env,
            source: StackSource::InlineContent(payload.stack_file_content),
        }
    }

    pub fn from_upload(name: String, content: Vec<u8>, env: Vec<Pair>) -> Self {
        Self {
            name,
            env,
            source: StackSource::UploadedBytes(content),
        }
    }

    pub fn from_repository(payload: ComposeStackFromGitRepositoryPayload) -> Self {
        let credentials = payload
            .repository_authentication
            .then(|| RepositoryCredentials {
                username: payload.repository_username,
                password: SecretString::from(payload.repository_password),
            });

        Self {
            name: payload.name,
            env: payload.env,
            source: StackSource::Repository(RepositoryDescriptor {
                url: payload.repository_url,
                reference_name: payload.repository_reference_name,
                credentials,
                compose_file_path: payload.compose_file_path_in_repository,
            }),
        }
    }

    /// Reject malformed requests before any side effect
    pub fn validate(&self) -> Result<(), StackError> {
        if self.name.trim().is_empty() {
            return Err(invalid("Invalid stack name"));
        }

        match &self.source {
            StackSource::InlineContent(content) if content.trim().is_empty() => {
                Err(invalid("Invalid stack file content"))
            }
            StackSource::UploadedBytes(content) if content.is_empty() => Err(invalid(
                "Invalid Compose file. Ensure that the Compose file is uploaded correctly",
            )),
            StackSource::Repository(repository) => repository.validate(),
            _ => Ok(()),
        }
    }
}

impl RepositoryDescriptor {
    fn validate(&self) -> Result<(), StackError> {
        if self.url.trim().is_empty() || Url::parse(&self.url).is_err() {
            return Err(invalid(
                "Invalid repository URL. Must correspond to a valid URL format",
            ));
        }

        if let Some(credentials) = &self.credentials {
            if credentials.username.is_empty() || credentials.password.expose_secret().is_empty()
            {
                return Err(invalid(
                    "Invalid repository credentials. Username and password must be specified when authentication is enabled",
                ));
            }
        }

        let path = Path::new(&self.compose_file_path);
        if path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return Err(invalid(
                "Invalid Compose file path. Must be relative to the repository root",
            ));
        }

        Ok(())
    }

    /// Entry point inside the cloned repository
    pub fn entry_point(&self) -> String {
        if self.compose_file_path.trim().is_empty() {
            COMPOSE_FILE_DEFAULT_NAME.to_string()
        } else {
            self.compose_file_path.clone()
        }
    }
}

fn invalid(reason: &str) -> StackError {
    StackError::Validation(reason.to_string())
}

/// Result of materializing a stack source
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub project_path: PathBuf,
    pub entry_point: String,
    pub git_config: Option<GitConfig>,
}

/// Writes or clones stack files into the stack's project directory
pub struct SourceResolver {
    projects: Arc<dyn ProjectStore>,
    cloner: Arc<dyn RepositoryCloner>,
}

impl SourceResolver {
    pub fn new(projects: Arc<dyn ProjectStore>, cloner: Arc<dyn RepositoryCloner>) -> Self {
        Self { projects, cloner }
    }

    /// Materialize `source` under the folder of `stack_id`. On failure nothing written by
    /// this call is left on disk.
    pub async fn resolve(
        &self,
        stack_id: StackId,
        source: &StackSource,
    ) -> Result<ResolvedSource, StackError> {
        let folder = stack_id.folder();

        match source {
            StackSource::InlineContent(content) => {
                self.store_bytes(&folder, content.as_bytes()).await
            }
            StackSource::UploadedBytes(content) => self.store_bytes(&folder, content).await,
            StackSource::Repository(repository) => self.clone_repository(&folder, repository).await,
        }
    }

    async fn store_bytes(&self, folder: &str, content: &[u8]) -> Result<ResolvedSource, StackError> {
        match self
            .projects
            .store_stack_file_from_bytes(folder, COMPOSE_FILE_DEFAULT_NAME, content)
            .await
        {
            Ok(project_path) => Ok(ResolvedSource {
                project_path,
                entry_point: COMPOSE_FILE_DEFAULT_NAME.to_string(),
                git_config: None,
            }),
            Err(e) => {
                self.discard(&self.projects.stack_project_path(folder)).await;
                Err(StackError::storage("Unable to persist Compose file on disk", e))
            }
        }
    }

    async fn clone_repository(
        &self,
        folder: &str,
        repository: &RepositoryDescriptor,
    ) -> Result<ResolvedSource, StackError> {
        let project_path = self.projects.stack_project_path(folder);
        info!(
            "Resolving stack source from {}",
            redact_url(&repository.url)
        );

        let result = self
            .cloner
            .clone_repository(CloneParameters {
                url: &repository.url,
                reference_name: &repository.reference_name,
                destination: &project_path,
                credentials: repository.credentials.as_ref(),
            })
            .await;

        if let Err(e) = result {
            self.discard(&project_path).await;
            return Err(StackError::storage("Unable to clone git repository", e));
        }

        let entry_point = repository.entry_point();
        debug!("Repository cloned, entry point {}", entry_point);

        Ok(ResolvedSource {
            project_path,
            git_config: Some(GitConfig {
                url: repository.url.clone(),
                reference_name: repository.reference_name.clone(),
                config_file_path: entry_point.clone(),
            }),
            entry_point,
        })
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = self.projects.remove_directory(path).await {
            error!("Unable to remove partial project directory {:?}: {}", path, e);
        }
    }
}
