//! Endpoint security policy checks on compose files

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::errors::StackError;
use crate::models::endpoint::EndpointSecuritySettings;

#[derive(Debug, Default, Deserialize)]
struct ComposeDocument {
    #[serde(default)]
    services: BTreeMap<String, Option<ComposeService>>,
}

/// The service keys the security settings care about. Everything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct ComposeService {
    #[serde(default)]
    privileged: bool,
    #[serde(default)]
    volumes: Vec<Value>,
    #[serde(default)]
    pid: Option<String>,
    #[serde(default)]
    ipc: Option<String>,
    #[serde(default)]
    network_mode: Option<String>,
    #[serde(default)]
    devices: Vec<Value>,
    #[serde(default)]
    cap_add: Vec<String>,
}

impl ComposeService {
    fn uses_bind_mount(&self) -> bool {
        self.volumes.iter().any(is_bind_mount)
    }

    fn host_namespace(&self) -> Option<&'static str> {
        let is_host = |v: &Option<String>| v.as_deref() == Some("host");
        if is_host(&self.pid) {
            Some("pid")
        } else if is_host(&self.ipc) {
            Some("ipc")
        } else if is_host(&self.network_mode) {
            Some("network_mode")
        } else {
            None
        }
    }
}

/// Short syntax `source:target[:mode]` is a bind mount when the source is a host path.
/// Long syntax declares it with `type: bind`.
fn is_bind_mount(volume: &Value) -> bool {
    match volume {
        Value::String(spec) => match spec.split_once(':') {
            Some((source, _)) => {
                source.starts_with('/') || source.starts_with('.') || source.starts_with('~')
            }
            None => false,
        },
        Value::Mapping(mapping) => mapping
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|kind| kind == "bind"),
        _ => false,
    }
}

/// Parse with `<<` merge keys resolved, as compose does before starting anything
fn parse_document(content: &[u8]) -> Result<ComposeDocument, serde_yaml::Error> {
    let mut value: Value = serde_yaml::from_slice(content)?;
    value.apply_merge()?;
    serde_yaml::from_value(value)
}

/// Reject the compose file when any service uses a feature the endpoint disallows for
/// regular users
pub fn validate_stack_file(
    content: &[u8],
    settings: &EndpointSecuritySettings,
) -> Result<(), StackError> {
    let document = parse_document(content).map_err(|e| {
        debug!("Unable to parse stack file: {}", e);
        StackError::PolicyViolation("unable to parse stack file".to_string())
    })?;

    for (name, service) in &document.services {
        let Some(service) = service else {
            continue;
        };

        if !settings.allow_bind_mounts_for_regular_users && service.uses_bind_mount() {
            return Err(violation(name, "bind-mount disabled for non administrator users"));
        }

        if !settings.allow_privileged_mode_for_regular_users && service.privileged {
            return Err(violation(
                name,
                "privileged mode disabled for non administrator users",
            ));
        }

        if !settings.allow_host_namespace_for_regular_users {
            if let Some(namespace) = service.host_namespace() {
                return Err(violation(
                    name,
                    &format!("{} host disabled for non administrator users", namespace),
                ));
            }
        }

        if !settings.allow_device_mapping_for_regular_users && !service.devices.is_empty() {
            return Err(violation(
                name,
                "device mapping disabled for non administrator users",
            ));
        }

        if !settings.allow_container_capabilities_for_regular_users && !service.cap_add.is_empty()
        {
            return Err(violation(
                name,
                "container capabilities disabled for non administrator users",
            ));
        }
    }

    Ok(())
}

fn violation(service: &str, policy: &str) -> StackError {
    StackError::PolicyViolation(format!("{} (service {})", policy, service))
}
