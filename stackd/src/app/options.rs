//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Environment variable overriding the configured token secret
pub const JWT_SECRET_ENV: &str = "STACKD_JWT_SECRET";

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    pub server: ServerOptions,
    pub storage: StorageOptions,
    pub deploy: DeployOptions,
    pub auth: AuthOptions,
}

impl AppOptions {
    /// Derive the options from a settings file and the data directory it was read from
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let deploy = &settings.deploy;
        let secret = std::env::var(JWT_SECRET_ENV)
            .ok()
            .or_else(|| settings.auth.jwt_secret.clone())
            .filter(|s| !s.is_empty());

        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            storage: StorageOptions { layout },
            deploy: DeployOptions {
                docker_binary: deploy.docker_binary.clone(),
                compose_binary: deploy.compose_binary.clone(),
                git_binary: deploy.git_binary.clone(),
                clone_timeout: Duration::from_secs(deploy.clone_timeout_secs),
                compose_timeout: Duration::from_secs(deploy.compose_timeout_secs),
                login_timeout: Duration::from_secs(deploy.login_timeout_secs),
            },
            auth: AuthOptions {
                jwt_secret: secret.map(SecretString::from),
                token_ttl: Duration::from_secs(settings.auth.token_ttl_secs),
            },
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub layout: StorageLayout,
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
        }
    }
}

/// Control path options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub docker_binary: String,
    pub compose_binary: String,
    pub git_binary: String,
    pub clone_timeout: Duration,
    pub compose_timeout: Duration,
    pub login_timeout: Duration,
}

/// Access token options
#[derive(Debug)]
pub struct AuthOptions {
    /// Falls back to the secret stored in the data directory
    pub jwt_secret: Option<SecretString>,
    pub token_ttl: Duration,
}
