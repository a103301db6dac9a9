//! Metadata store
//!
//! One trait per entity, combined into [`DataStore`]. The orchestrator only depends on the
//! traits; [`json::JsonDataStore`] is the implementation shipped with the binary.

pub mod json;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::endpoint::{Endpoint, EndpointId};
use crate::models::registry::{DockerHub, Registry};
use crate::models::resource_control::{ResourceControl, ResourceControlType};
use crate::models::stack::{Stack, StackId};
use crate::models::user::{TeamMembership, User, UserId};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[async_trait]
pub trait StackStore: Send + Sync {
    async fn stacks(&self) -> Result<Vec<Stack>, StoreError>;

    async fn stack(&self, id: StackId) -> Result<Stack, StoreError>;

    /// Reserve the next stack identifier. Two callers never receive the same value.
    async fn next_identifier(&self) -> Result<StackId, StoreError>;

    /// Persist a new stack. Fails with `Conflict` when the ID is taken or another stack on
    /// the same endpoint has the same name, compared case-insensitively.
    async fn create_stack(&self, stack: &Stack) -> Result<(), StoreError>;

    async fn delete_stack(&self, id: StackId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ResourceControlStore: Send + Sync {
    /// Persist a resource control and return it with its assigned ID
    async fn create_resource_control(
        &self,
        resource_control: ResourceControl,
    ) -> Result<ResourceControl, StoreError>;

    async fn resource_controls(&self) -> Result<Vec<ResourceControl>, StoreError>;

    async fn resource_control_by_resource_id(
        &self,
        resource_id: &str,
        resource_type: ResourceControlType,
    ) -> Result<ResourceControl, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, id: UserId) -> Result<User, StoreError>;

    async fn team_memberships_by_user(&self, id: UserId) -> Result<Vec<TeamMembership>, StoreError>;
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn registries(&self) -> Result<Vec<Registry>, StoreError>;

    async fn docker_hub(&self) -> Result<DockerHub, StoreError>;
}

#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, StoreError>;
}

/// Every store the control plane consumes
pub trait DataStore:
    StackStore + ResourceControlStore + UserStore + RegistryStore + EndpointStore
{
}

impl<T> DataStore for T where
    T: StackStore + ResourceControlStore + UserStore + RegistryStore + EndpointStore
{
}
