//! Stack models

use std::fmt;

use serde::{Deserialize, Serialize};

pub use stackd_api::Pair;

use crate::models::endpoint::EndpointId;
use crate::models::resource_control::ResourceControl;

/// Default entry point of a compose stack
pub const COMPOSE_FILE_DEFAULT_NAME: &str = "docker-compose.yml";

/// Stack identifier, allocated by the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(pub u32);

impl StackId {
    /// Name of the project folder holding this stack's files
    pub fn folder(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orchestration flavour of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    Swarm,
    Compose,
    Kubernetes,
}

impl StackType {
    /// Map the numeric `type` query parameter
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StackType::Swarm),
            2 => Some(StackType::Compose),
            3 => Some(StackType::Kubernetes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    Active,
    Inactive,
}

/// Where a repository-sourced stack came from. Credentials are never recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GitConfig {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(default)]
    pub reference_name: String,
    pub config_file_path: String,
}

/// A deployable unit of one or more services targeting one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    pub id: StackId,
    pub name: String,
    #[serde(rename = "Type")]
    pub stack_type: StackType,
    pub endpoint_id: EndpointId,
    pub entry_point: String,
    #[serde(default)]
    pub env: Vec<Pair>,
    pub status: StackStatus,
    #[serde(default)]
    pub project_path: String,
    /// Unix timestamp, seconds
    pub creation_date: i64,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_config: Option<GitConfig>,
    /// Attached when the stack is returned to a caller, never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_control: Option<ResourceControl>,
}

impl Stack {
    /// Build an active compose stack that has not been materialized yet
    pub fn new_compose(
        id: StackId,
        name: String,
        endpoint_id: EndpointId,
        entry_point: String,
        env: Vec<Pair>,
    ) -> Self {
        Self {
            id,
            name,
            stack_type: StackType::Compose,
            endpoint_id,
            entry_point,
            env,
            status: StackStatus::Active,
            project_path: String::new(),
            creation_date: chrono::Utc::now().timestamp(),
            created_by: String::new(),
            git_config: None,
            resource_control: None,
        }
    }

    /// Identifier used by the stack's resource control
    pub fn resource_id(&self) -> String {
        format!("{}_{}", self.endpoint_id, self.name)
    }

    /// Full path of the entry point inside the project directory
    pub fn entry_point_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.project_path).join(&self.entry_point)
    }
}
