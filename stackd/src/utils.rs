//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for stackd
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("STACKD_GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("STACKD_BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Random secret for signing access tokens when none is configured
pub fn generate_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}
