//! Resource and environment helpers for collector specs

use crate::crd::{CollectorSpec, Role};
use crate::quantity;
use crate::template::ACCESS_TOKEN_SECRET;
use k8s_openapi::api::core::v1::{
    EnvVar, EnvVarSource, ObjectFieldSelector, ResourceRequirements, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use tracing::warn;

use super::literals::{
    AGENT_CPU, AGENT_MEMORY, CLUSTER_RECEIVER_CPU, CLUSTER_RECEIVER_MEMORY, GATEWAY_CPU,
    GATEWAY_MEMORY,
};

/// Key of the access token inside [`ACCESS_TOKEN_SECRET`]
pub const ACCESS_TOKEN_KEY: &str = "splunk-observability-access-token";

pub const MEMORY_TOTAL_ENV: &str = "SPLUNK_MEMORY_TOTAL_MIB";

/// Default CPU and memory for a role
pub fn default_resources(role: Role) -> (&'static str, &'static str) {
    match role {
        Role::Agent => (AGENT_CPU, AGENT_MEMORY),
        Role::ClusterReceiver => (CLUSTER_RECEIVER_CPU, CLUSTER_RECEIVER_MEMORY),
        Role::Gateway => (GATEWAY_CPU, GATEWAY_MEMORY),
    }
}

/// Set limits and requests to `cpu`/`memory` when neither is present
pub fn apply_default_resources(spec: &mut CollectorSpec, cpu: &str, memory: &str) {
    if spec.resources.limits.is_some() || spec.resources.requests.is_some() {
        return;
    }

    let list: BTreeMap<String, Quantity> = [
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ]
    .into_iter()
    .collect();

    spec.resources = ResourceRequirements {
        limits: Some(list.clone()),
        requests: Some(list),
        ..Default::default()
    };
}

fn env_value(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn env_field_ref(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: path.to_string(),
            }),
            ..Default::default()
        }),
    }
}

/// Fill the collector environment when the user supplied none
///
/// `SPLUNK_MEMORY_TOTAL_MIB` is appended only when a memory limit is set.
pub fn apply_default_env(spec: &mut CollectorSpec, realm: &str, cluster_name: &str) {
    if spec.env.is_some() {
        return;
    }

    let mut env = vec![
        EnvVar {
            name: "SPLUNK_OBSERVABILITY_ACCESS_TOKEN".to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: Some(ACCESS_TOKEN_SECRET.to_string()),
                    key: ACCESS_TOKEN_KEY.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
        },
        env_value("SPLUNK_REALM", realm),
        env_value("MY_CLUSTER_NAME", cluster_name),
        env_value("HOST_PROC", "/hostfs/proc"),
        env_value("HOST_SYS", "/hostfs/sys"),
        env_value("HOST_ETC", "/hostfs/etc"),
        env_value("HOST_VAR", "/hostfs/var"),
        env_value("HOST_RUN", "/hostfs/run"),
        env_value("HOST_DEV", "/hostfs/dev"),
        env_field_ref("MY_NODE_NAME", "spec.nodeName"),
        env_field_ref("MY_NODE_IP", "status.hostIP"),
        env_field_ref("MY_POD_IP", "status.podIP"),
        env_field_ref("MY_POD_NAME", "metadata.name"),
        env_field_ref("MY_POD_UID", "metadata.uid"),
        env_field_ref("MY_NAMESPACE", "metadata.namespace"),
    ];

    let memory_limit = spec
        .resources
        .limits
        .as_ref()
        .and_then(|limits| limits.get("memory"));
    if let Some(memory) = memory_limit {
        match quantity::mebibytes(memory) {
            Ok(mib) => env.push(env_value(MEMORY_TOTAL_ENV, &mib.to_string())),
            Err(e) => warn!(memory = %memory.0, error = %e, "Ignoring unparsable memory limit"),
        }
    }

    spec.env = Some(env);
}
