//! Endpoint models

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::user::{TeamId, UserId};

/// Role granting endpoint administration through an access policy
pub const ENDPOINT_ADMIN_ROLE_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access granted to a user or team on a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessPolicy {
    #[serde(default)]
    pub role_id: u32,
}

pub type UserAccessPolicies = BTreeMap<UserId, AccessPolicy>;
pub type TeamAccessPolicies = BTreeMap<TeamId, AccessPolicy>;

/// Features regular users may use on an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSecuritySettings {
    #[serde(default)]
    pub allow_bind_mounts_for_regular_users: bool,
    #[serde(default)]
    pub allow_privileged_mode_for_regular_users: bool,
    #[serde(default)]
    pub allow_host_namespace_for_regular_users: bool,
    #[serde(default)]
    pub allow_device_mapping_for_regular_users: bool,
    #[serde(default)]
    pub allow_container_capabilities_for_regular_users: bool,
}

impl EndpointSecuritySettings {
    /// Every feature allowed
    pub fn permissive() -> Self {
        Self {
            allow_bind_mounts_for_regular_users: true,
            allow_privileged_mode_for_regular_users: true,
            allow_host_namespace_for_regular_users: true,
            allow_device_mapping_for_regular_users: true,
            allow_container_capabilities_for_regular_users: true,
        }
    }

    /// Whether at least one feature is denied to regular users
    pub fn restricts_anything(&self) -> bool {
        !(self.allow_bind_mounts_for_regular_users
            && self.allow_privileged_mode_for_regular_users
            && self.allow_host_namespace_for_regular_users
            && self.allow_device_mapping_for_regular_users
            && self.allow_container_capabilities_for_regular_users)
    }
}

/// A managed container engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    /// Engine address, e.g. `unix:///var/run/docker.sock` or `tcp://10.0.0.4:2375`.
    /// Empty means the local engine.
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(default)]
    pub security_settings: EndpointSecuritySettings,
    #[serde(default)]
    pub user_access_policies: UserAccessPolicies,
    #[serde(default)]
    pub team_access_policies: TeamAccessPolicies,
}

impl Endpoint {
    pub fn new(id: EndpointId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            security_settings: EndpointSecuritySettings::default(),
            user_access_policies: UserAccessPolicies::new(),
            team_access_policies: TeamAccessPolicies::new(),
        }
    }
}
