//! JSON file backed metadata store
//!
//! The whole snapshot lives in memory behind a `RwLock`; every mutation is written back
//! to disk with an atomic rename before the lock is released. Without a backing file the
//! store is purely in-memory.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::datastore::{
    EndpointStore, RegistryStore, ResourceControlStore, StackStore, StoreError, UserStore,
};
use crate::filesys::file::File;
use crate::models::endpoint::{Endpoint, EndpointId};
use crate::models::registry::{DockerHub, Registry};
use crate::models::resource_control::{ResourceControl, ResourceControlId, ResourceControlType};
use crate::models::stack::{Stack, StackId};
use crate::models::user::{TeamMembership, User, UserId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sequences {
    #[serde(default)]
    stack: u32,
    #[serde(default)]
    resource_control: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    sequences: Sequences,
    #[serde(default)]
    stacks: Vec<Stack>,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    team_memberships: Vec<TeamMembership>,
    #[serde(default)]
    registries: Vec<Registry>,
    #[serde(default)]
    docker_hub: DockerHub,
    #[serde(default)]
    resource_controls: Vec<ResourceControl>,
}

pub struct JsonDataStore {
    file: Option<File>,
    snapshot: RwLock<Snapshot>,
}

impl JsonDataStore {
    /// A store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            file: None,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Open the store at `path`, creating an empty one if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file = File::new(path);
        let snapshot = if file.exists().await {
            let snapshot: Snapshot = file.read_json().await?;
            info!(
                "Loaded metadata store {:?}: {} stacks, {} endpoints, {} users",
                file.path(),
                snapshot.stacks.len(),
                snapshot.endpoints.len(),
                snapshot.users.len()
            );
            snapshot
        } else {
            info!("Creating metadata store {:?}", file.path());
            let snapshot = Snapshot::default();
            file.write_json_atomic(&snapshot).await?;
            snapshot
        };

        Ok(Self {
            file: Some(file),
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn flush(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(file) = &self.file {
            file.write_json_atomic(snapshot).await?;
            debug!("Flushed metadata store to {:?}", file.path());
        }
        Ok(())
    }

    /// Insert or replace an endpoint
    pub async fn upsert_endpoint(&self, endpoint: Endpoint) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.endpoints.retain(|e| e.id != endpoint.id);
        snapshot.endpoints.push(endpoint);
        self.flush(&snapshot).await
    }

    /// Insert or replace a user
    pub async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.users.retain(|u| u.id != user.id);
        snapshot.users.push(user);
        self.flush(&snapshot).await
    }

    pub async fn add_team_membership(&self, membership: TeamMembership) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot
            .team_memberships
            .retain(|m| !(m.user_id == membership.user_id && m.team_id == membership.team_id));
        snapshot.team_memberships.push(membership);
        self.flush(&snapshot).await
    }

    /// Insert or replace a registry
    pub async fn upsert_registry(&self, registry: Registry) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.registries.retain(|r| r.id != registry.id);
        snapshot.registries.push(registry);
        self.flush(&snapshot).await
    }

    pub async fn set_docker_hub(&self, docker_hub: DockerHub) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.docker_hub = docker_hub;
        self.flush(&snapshot).await
    }
}

#[async_trait]
impl StackStore for JsonDataStore {
    async fn stacks(&self) -> Result<Vec<Stack>, StoreError> {
        Ok(self.snapshot.read().await.stacks.clone())
    }

    async fn stack(&self, id: StackId) -> Result<Stack, StoreError> {
        self.snapshot
            .read()
            .await
            .stacks
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stack {}", id)))
    }

    async fn next_identifier(&self) -> Result<StackId, StoreError> {
        let mut snapshot = self.snapshot.write().await;
        let highest = snapshot.stacks.iter().map(|s| s.id.0).max().unwrap_or(0);
        let next = snapshot.sequences.stack.max(highest) + 1;
        snapshot.sequences.stack = next;
        self.flush(&snapshot).await?;
        Ok(StackId(next))
    }

    async fn create_stack(&self, stack: &Stack) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;

        if snapshot.stacks.iter().any(|s| s.id == stack.id) {
            return Err(StoreError::Conflict(format!(
                "A stack with the identifier {} already exists",
                stack.id
            )));
        }
        if snapshot.stacks.iter().any(|s| {
            s.endpoint_id == stack.endpoint_id && s.name.eq_ignore_ascii_case(&stack.name)
        }) {
            return Err(StoreError::Conflict(format!(
                "A stack with the name '{}' already exists",
                stack.name
            )));
        }

        let mut record = stack.clone();
        record.resource_control = None;
        snapshot.stacks.push(record);

        if let Err(e) = self.flush(&snapshot).await {
            snapshot.stacks.retain(|s| s.id != stack.id);
            return Err(e);
        }
        Ok(())
    }

    async fn delete_stack(&self, id: StackId) -> Result<(), StoreError> {
        let mut snapshot = self.snapshot.write().await;
        let before = snapshot.stacks.len();
        snapshot.stacks.retain(|s| s.id != id);
        if snapshot.stacks.len() == before {
            return Err(StoreError::NotFound(format!("stack {}", id)));
        }
        self.flush(&snapshot).await
    }
}

#[async_trait]
impl ResourceControlStore for JsonDataStore {
    async fn create_resource_control(
        &self,
        mut resource_control: ResourceControl,
    ) -> Result<ResourceControl, StoreError> {
        let mut snapshot = self.snapshot.write().await;
        snapshot.sequences.resource_control += 1;
        resource_control.id = ResourceControlId(snapshot.sequences.resource_control);
        snapshot.resource_controls.push(resource_control.clone());

        if let Err(e) = self.flush(&snapshot).await {
            snapshot
                .resource_controls
                .retain(|rc| rc.id != resource_control.id);
            return Err(e);
        }
        Ok(resource_control)
    }

    async fn resource_controls(&self) -> Result<Vec<ResourceControl>, StoreError> {
        Ok(self.snapshot.read().await.resource_controls.clone())
    }

    async fn resource_control_by_resource_id(
        &self,
        resource_id: &str,
        resource_type: ResourceControlType,
    ) -> Result<ResourceControl, StoreError> {
        self.snapshot
            .read()
            .await
            .resource_controls
            .iter()
            .find(|rc| rc.resource_id == resource_id && rc.resource_type == resource_type)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("resource control {}", resource_id)))
    }
}

#[async_trait]
impl UserStore for JsonDataStore {
    async fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.snapshot
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }

    async fn team_memberships_by_user(
        &self,
        id: UserId,
    ) -> Result<Vec<TeamMembership>, StoreError> {
        Ok(self
            .snapshot
            .read()
            .await
            .team_memberships
            .iter()
            .filter(|m| m.user_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RegistryStore for JsonDataStore {
    async fn registries(&self) -> Result<Vec<Registry>, StoreError> {
        Ok(self.snapshot.read().await.registries.clone())
    }

    async fn docker_hub(&self) -> Result<DockerHub, StoreError> {
        Ok(self.snapshot.read().await.docker_hub.clone())
    }
}

#[async_trait]
impl EndpointStore for JsonDataStore {
    async fn endpoint(&self, id: EndpointId) -> Result<Endpoint, StoreError> {
        self.snapshot
            .read()
            .await
            .endpoints
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("endpoint {}", id)))
    }
}
