//! Agent custom resource definition
//!
//! An `Agent` describes up to three collector roles (node agent, cluster
//! receiver, gateway) plus auto-instrumentation settings. Every field a user
//! leaves out is filled in at admission time by [`crate::defaults`].

use k8s_openapi::api::core::v1::{
    EnvVar, ResourceRequirements, SecurityContext, ServicePort, Toleration, Volume, VolumeMount,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Agent CRD
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[kube(
    group = "otel.splunk.com",
    version = "v1alpha1",
    kind = "Agent",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Cluster name reported by every collector
    #[serde(default)]
    pub cluster_name: String,

    #[serde(default)]
    pub instrumentation: InstrumentationSpec,

    /// Node agent, one pod per node
    #[serde(default)]
    pub agent: CollectorSpec,

    /// Cluster-level metrics receiver, a single pod
    #[serde(default)]
    pub cluster_receiver: CollectorSpec,

    /// Optional gateway deployment
    #[serde(default)]
    pub gateway: CollectorSpec,
}

impl AgentSpec {
    /// Iterate the three roles with their specs
    pub fn roles(&self) -> [(Role, &CollectorSpec); 3] {
        [
            (Role::Agent, &self.agent),
            (Role::ClusterReceiver, &self.cluster_receiver),
            (Role::Gateway, &self.gateway),
        ]
    }

    pub fn role_mut(&mut self, role: Role) -> &mut CollectorSpec {
        match role {
            Role::Agent => &mut self.agent,
            Role::ClusterReceiver => &mut self.cluster_receiver,
            Role::Gateway => &mut self.gateway,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationSpec {
    #[serde(default)]
    pub java: JavaInstrumentation,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JavaInstrumentation {
    /// Container image holding the Java agent jar
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
}

/// Per-role collector specification
///
/// Optional collections are `None` when the user did not set them. An empty
/// list is a user decision and survives defaulting.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSpec {
    #[serde(default, skip_serializing_if = "Enablement::is_unset")]
    #[schemars(with = "Option<bool>")]
    pub enabled: Enablement,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub host_network: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMount>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,

    #[serde(default, skip_serializing_if = "is_unset_resources")]
    pub resources: ResourceRequirements,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Serialized collector pipeline configuration
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,

    /// Extra collector flags, `--<key>=<value>`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ServicePort>>,
}

fn is_unset_resources(resources: &ResourceRequirements) -> bool {
    resources == &ResourceRequirements::default()
}

/// Tri-state role switch
///
/// Serialized as an optional boolean so that "not specified" and
/// "explicitly disabled" stay distinguishable on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Enablement {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl Enablement {
    pub fn is_unset(&self) -> bool {
        matches!(self, Enablement::Unset)
    }

    /// True only for an explicit or resolved `Enabled`
    pub fn is_enabled(&self) -> bool {
        matches!(self, Enablement::Enabled)
    }

    /// Resolve `Unset` to the given default, keep explicit values
    pub fn resolve(self, default_enabled: bool) -> Self {
        match self {
            Enablement::Unset => Enablement::from(default_enabled),
            explicit => explicit,
        }
    }
}

impl From<bool> for Enablement {
    fn from(enabled: bool) -> Self {
        if enabled {
            Enablement::Enabled
        } else {
            Enablement::Disabled
        }
    }
}

impl From<Option<bool>> for Enablement {
    fn from(value: Option<bool>) -> Self {
        value.map(Enablement::from).unwrap_or(Enablement::Unset)
    }
}

impl From<Enablement> for Option<bool> {
    fn from(value: Enablement) -> Self {
        match value {
            Enablement::Unset => None,
            Enablement::Enabled => Some(true),
            Enablement::Disabled => Some(false),
        }
    }
}

/// Collector role within an Agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Agent,
    ClusterReceiver,
    Gateway,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Agent, Role::ClusterReceiver, Role::Gateway];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::ClusterReceiver => "clusterReceiver",
            Role::Gateway => "gateway",
        }
    }

    /// Enablement a role resolves to when the user says nothing
    pub fn enabled_by_default(&self) -> bool {
        match self {
            Role::Agent | Role::ClusterReceiver => true,
            Role::Gateway => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enablement_round_trips_through_optional_bool() {
        let spec: CollectorSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec.enabled, Enablement::Unset);

        let spec: CollectorSpec = serde_json::from_value(json!({"enabled": false})).unwrap();
        assert_eq!(spec.enabled, Enablement::Disabled);

        let spec: CollectorSpec = serde_json::from_value(json!({"enabled": null})).unwrap();
        assert_eq!(spec.enabled, Enablement::Unset);

        let value = serde_json::to_value(CollectorSpec::default()).unwrap();
        assert!(value.get("enabled").is_none());

        let spec = CollectorSpec {
            enabled: Enablement::Disabled,
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(spec).unwrap()["enabled"], json!(false));
    }

    #[test]
    fn test_enablement_resolve_keeps_explicit_choice() {
        assert_eq!(Enablement::Unset.resolve(true), Enablement::Enabled);
        assert_eq!(Enablement::Unset.resolve(false), Enablement::Disabled);
        assert_eq!(Enablement::Disabled.resolve(true), Enablement::Disabled);
        assert_eq!(Enablement::Enabled.resolve(false), Enablement::Enabled);
    }

    #[test]
    fn test_empty_list_is_distinct_from_unset() {
        let spec: CollectorSpec = serde_json::from_value(json!({"tolerations": []})).unwrap();
        assert_eq!(spec.tolerations, Some(vec![]));
        assert_eq!(CollectorSpec::default().tolerations, None);
    }

    #[test]
    fn test_agent_spec_parses_camel_case() {
        let spec: AgentSpec = serde_json::from_value(json!({
            "clusterName": "prod1",
            "clusterReceiver": {"hostNetwork": true, "replicas": 2},
            "instrumentation": {"java": {"image": "custom:1"}}
        }))
        .unwrap();

        assert_eq!(spec.cluster_name, "prod1");
        assert!(spec.cluster_receiver.host_network);
        assert_eq!(spec.cluster_receiver.replicas, Some(2));
        assert_eq!(spec.instrumentation.java.image, "custom:1");
        assert!(spec.gateway.enabled.is_unset());
    }

    #[test]
    fn test_role_defaults() {
        assert!(Role::Agent.enabled_by_default());
        assert!(Role::ClusterReceiver.enabled_by_default());
        assert!(!Role::Gateway.enabled_by_default());
        assert_eq!(Role::ClusterReceiver.to_string(), "clusterReceiver");
    }
}
