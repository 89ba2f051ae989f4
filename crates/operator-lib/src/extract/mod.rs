//! Default extraction from rendered chart documents
//!
//! Each role's defaults come from a handful of well-known chart files. The
//! extractor picks the first document whose name matches, decodes it, and
//! skips (with a warning) any document that fails to decode.

mod manifest;

pub use manifest::{DecodeError, Manifest, Workload};

use crate::observability::WebhookMetrics;
use crate::template::RenderedTemplate;
use k8s_openapi::api::core::v1::{EnvVar, ServicePort, Toleration, Volume, VolumeMount};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Config document key holding the collector pipeline
pub const RELAY_KEY: &str = "relay";

/// Volume the agent daemonset mounts its config from; re-added downstream
pub const AGENT_CONFIG_VOLUME: &str = "otel-configmap";

/// Volume the gateway deployment mounts its config from; re-added downstream
pub const GATEWAY_CONFIG_VOLUME: &str = "collector-configmap";

/// Chart files the defaults are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPattern {
    AgentDaemonSet,
    ClusterReceiverDeployment,
    GatewayDeployment,
    AgentConfig,
    ClusterReceiverConfig,
    GatewayConfig,
    Service,
}

impl DocumentPattern {
    const ALL: [DocumentPattern; 7] = [
        DocumentPattern::AgentDaemonSet,
        DocumentPattern::ClusterReceiverDeployment,
        DocumentPattern::GatewayDeployment,
        DocumentPattern::AgentConfig,
        DocumentPattern::ClusterReceiverConfig,
        DocumentPattern::GatewayConfig,
        DocumentPattern::Service,
    ];

    pub fn expression(&self) -> &'static str {
        match self {
            DocumentPattern::AgentDaemonSet => r"(^|/)daemonset\.yaml$",
            DocumentPattern::ClusterReceiverDeployment => r"(^|/)deployment-cluster-receiver\.yaml$",
            DocumentPattern::GatewayDeployment => r"(^|/)deployment-gateway\.yaml$",
            DocumentPattern::AgentConfig => r"(^|/)configmap-agent\.yaml$",
            DocumentPattern::ClusterReceiverConfig => r"(^|/)configmap-cluster-receiver\.yaml$",
            DocumentPattern::GatewayConfig => r"(^|/)configmap-gateway\.yaml$",
            DocumentPattern::Service => r"(^|/)service\.yaml$",
        }
    }

    /// Chart file the pattern targets
    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentPattern::AgentDaemonSet => "daemonset.yaml",
            DocumentPattern::ClusterReceiverDeployment => "deployment-cluster-receiver.yaml",
            DocumentPattern::GatewayDeployment => "deployment-gateway.yaml",
            DocumentPattern::AgentConfig => "configmap-agent.yaml",
            DocumentPattern::ClusterReceiverConfig => "configmap-cluster-receiver.yaml",
            DocumentPattern::GatewayConfig => "configmap-gateway.yaml",
            DocumentPattern::Service => "service.yaml",
        }
    }

    pub fn regex(&self) -> &'static Regex {
        static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
        let compiled = COMPILED.get_or_init(|| {
            Self::ALL
                .iter()
                .map(|p| Regex::new(p.expression()).expect("document patterns are valid"))
                .collect()
        });
        &compiled[*self as usize]
    }
}

impl fmt::Display for DocumentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// First document matching `pattern` that decodes and passes `select`
///
/// Decode failures and documents of the wrong kind are logged and skipped.
pub fn extract_with<T>(
    rendered: &RenderedTemplate,
    pattern: DocumentPattern,
    select: impl Fn(Manifest) -> Option<T>,
) -> Option<T> {
    for (name, text) in rendered.matching(pattern.regex()) {
        match Manifest::decode(text) {
            Ok(manifest) => {
                let kind = manifest.kind();
                if let Some(selected) = select(manifest) {
                    return Some(selected);
                }
                warn!(document = %name, kind = %kind, pattern = %pattern, "Skipping document of unexpected kind");
            }
            Err(e) => {
                WebhookMetrics::new().inc_decode_skips();
                warn!(document = %name, error = %e, "Error while decoding rendered document, skipping");
            }
        }
    }
    None
}

/// First decodable document matching `pattern`
pub fn extract(rendered: &RenderedTemplate, pattern: DocumentPattern) -> Option<Manifest> {
    extract_with(rendered, pattern, Some)
}

/// Pod-level defaults taken from a workload's pod template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadDefaults {
    pub volumes: Option<Vec<Volume>>,
    pub volume_mounts: Option<Vec<VolumeMount>>,
    pub tolerations: Option<Vec<Toleration>>,
    pub replicas: Option<i32>,
    pub limits: Option<BTreeMap<String, Quantity>>,
    pub env: Option<Vec<EnvVar>>,
}

impl From<&Workload> for WorkloadDefaults {
    fn from(workload: &Workload) -> Self {
        let pod = workload.pod_spec();
        let container = workload.first_container();

        Self {
            volumes: pod.and_then(|p| p.volumes.clone()),
            volume_mounts: container
                .and_then(|c| c.volume_mounts.clone())
                .filter(|mounts| !mounts.is_empty()),
            tolerations: pod.and_then(|p| p.tolerations.clone()),
            replicas: workload.replicas(),
            limits: container
                .and_then(|c| c.resources.as_ref())
                .and_then(|r| r.limits.clone()),
            env: container.and_then(|c| c.env.clone()),
        }
    }
}

fn workload_defaults(
    rendered: &RenderedTemplate,
    pattern: DocumentPattern,
    config_volume: Option<&str>,
) -> Option<WorkloadDefaults> {
    let mut workload = extract_with(rendered, pattern, Manifest::into_workload)?;
    if let Some(volume) = config_volume {
        workload.strip_volume_mount(volume);
    }
    Some(WorkloadDefaults::from(&workload))
}

/// Agent daemonset defaults, without the config volume mount
pub fn agent_daemonset(rendered: &RenderedTemplate) -> Option<WorkloadDefaults> {
    workload_defaults(rendered, DocumentPattern::AgentDaemonSet, Some(AGENT_CONFIG_VOLUME))
}

pub fn cluster_receiver_deployment(rendered: &RenderedTemplate) -> Option<WorkloadDefaults> {
    workload_defaults(rendered, DocumentPattern::ClusterReceiverDeployment, None)
}

/// Gateway deployment defaults, without the config volume mount
pub fn gateway_deployment(rendered: &RenderedTemplate) -> Option<WorkloadDefaults> {
    workload_defaults(rendered, DocumentPattern::GatewayDeployment, Some(GATEWAY_CONFIG_VOLUME))
}

/// The `relay` entry of the config document matching `pattern`
pub fn relay_config(rendered: &RenderedTemplate, pattern: DocumentPattern) -> Option<String> {
    let config_map = extract_with(rendered, pattern, Manifest::into_config_document)?;
    config_map.data?.remove(RELAY_KEY)
}

pub fn service_ports(rendered: &RenderedTemplate) -> Option<Vec<ServicePort>> {
    let service = extract_with(rendered, DocumentPattern::Service, Manifest::into_service)?;
    service.spec?.ports
}

#[cfg(test)]
mod tests;
