//! Registry models

use serde::{Deserialize, Serialize};

use crate::models::endpoint::{TeamAccessPolicies, UserAccessPolicies};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(pub u32);

/// A private registry the control plane can authenticate against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Registry {
    pub id: RegistryId,
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub user_access_policies: UserAccessPolicies,
    #[serde(default)]
    pub team_access_policies: TeamAccessPolicies,
}

/// Credentials for the default registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerHub {
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
