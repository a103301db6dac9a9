//! Resource ownership records

use serde::{Deserialize, Serialize};

use crate::models::user::{TeamId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceControlId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceControlType {
    Container,
    Service,
    Volume,
    Network,
    Stack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserResourceAccess {
    pub user_id: UserId,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamResourceAccess {
    pub team_id: TeamId,
    pub access_level: AccessLevel,
}

/// Who may see and operate a deployed resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceControl {
    /// Assigned by the store on creation
    #[serde(default)]
    pub id: ResourceControlId,
    pub resource_id: String,
    #[serde(default)]
    pub sub_resource_ids: Vec<String>,
    #[serde(rename = "Type")]
    pub resource_type: ResourceControlType,
    #[serde(default)]
    pub user_accesses: Vec<UserResourceAccess>,
    #[serde(default)]
    pub team_accesses: Vec<TeamResourceAccess>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub administrators_only: bool,
}

impl ResourceControl {
    /// A resource control granting read/write access to a single user
    pub fn new_private(
        resource_id: impl Into<String>,
        resource_type: ResourceControlType,
        user_id: UserId,
    ) -> Self {
        Self {
            id: ResourceControlId::default(),
            resource_id: resource_id.into(),
            sub_resource_ids: Vec::new(),
            resource_type,
            user_accesses: vec![UserResourceAccess {
                user_id,
                access_level: AccessLevel::ReadWrite,
            }],
            team_accesses: Vec::new(),
            public: false,
            administrators_only: false,
        }
    }
}
