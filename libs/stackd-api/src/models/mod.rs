//! Request and response models

use serde::{Deserialize, Serialize};

/// A key/value pair, used for stack environment variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub name: String,
    pub value: String,
}

impl Pair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payload for `method=string`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComposeStackFromFileContentPayload {
    /// Name of the stack
    #[serde(default)]
    pub name: String,

    /// Content of the stack file
    #[serde(default)]
    pub stack_file_content: String,

    /// Environment variables used during stack deployment
    #[serde(default)]
    pub env: Vec<Pair>,
}

/// Payload for `method=repository`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComposeStackFromGitRepositoryPayload {
    /// Name of the stack
    #[serde(default)]
    pub name: String,

    /// URL of a git repository hosting the stack file
    #[serde(default, rename = "RepositoryURL")]
    pub repository_url: String,

    /// Reference name (e.g. `refs/heads/main`), empty for the default branch
    #[serde(default)]
    pub repository_reference_name: String,

    /// Use basic authentication to clone the repository
    #[serde(default)]
    pub repository_authentication: bool,

    #[serde(default)]
    pub repository_username: String,

    #[serde(default)]
    pub repository_password: String,

    /// Path to the stack file inside the repository
    #[serde(default)]
    pub compose_file_path_in_repository: String,

    /// Environment variables used during stack deployment
    #[serde(default)]
    pub env: Vec<Pair>,
}

/// Query string of `POST /api/stacks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackCreateQuery {
    /// Stack type, only compose (2) is accepted
    #[serde(rename = "type", default = "default_stack_type")]
    pub stack_type: u8,

    /// Creation method: `string`, `file` or `repository`
    pub method: String,

    #[serde(rename = "endpointId")]
    pub endpoint_id: u32,
}

fn default_stack_type() -> u8 {
    2
}

/// Query string of `GET /api/stacks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackListQuery {
    #[serde(rename = "endpointId", default)]
    pub endpoint_id: Option<u32>,
}

/// Error body returned by every failing handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}
