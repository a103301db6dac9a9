//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// stackd settings, read from `settings.json` in the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Also write daily-rolling log files under the logs directory
    #[serde(default = "default_true")]
    pub log_to_file: bool,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub deploy: DeploySettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_to_file: true,
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            deploy: DeploySettings::default(),
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Access token settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for access tokens. Overridden by `STACKD_JWT_SECRET`; a random secret
    /// is generated at startup when neither is set.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    8 * 60 * 60
}

/// Control path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Standalone compose binary used when the docker CLI has no compose plugin
    #[serde(default = "default_compose_binary")]
    pub compose_binary: String,

    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,

    #[serde(default = "default_compose_timeout")]
    pub compose_timeout_secs: u64,

    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_compose_binary() -> String {
    "docker-compose".to_string()
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_clone_timeout() -> u64 {
    120
}

fn default_compose_timeout() -> u64 {
    600
}

fn default_login_timeout() -> u64 {
    30
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            compose_binary: default_compose_binary(),
            git_binary: default_git_binary(),
            clone_timeout_secs: default_clone_timeout(),
            compose_timeout_secs: default_compose_timeout(),
            login_timeout_secs: default_login_timeout(),
        }
    }
}
