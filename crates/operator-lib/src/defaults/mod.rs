//! Admission-time defaulting for Agent resources
//!
//! Defaulting runs in fixed stages: labels, instrumentation, role
//! enablement, then per-role defaults. Per-role defaults come from a fresh
//! chart render; a field is only ever filled when the user left it unset.

mod env;
mod literals;


pub use env::{apply_default_env, apply_default_resources, default_resources, ACCESS_TOKEN_KEY, MEMORY_TOTAL_ENV};
pub use literals::*;

use crate::crd::{Agent, CollectorSpec, Role};
use crate::distro::Distro;
use crate::extract::{self, DocumentPattern, WorkloadDefaults};
use crate::observability::WebhookMetrics;
use crate::template::{RenderedTemplate, TemplateError, TemplateProvider};
use k8s_openapi::api::core::v1::SecurityContext;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Errors that leave a resource without its defaults
#[derive(Debug, thiserror::Error)]
pub enum DefaultingError {
    #[error("{role} defaults unavailable: {source}")]
    Template {
        role: Role,
        #[source]
        source: TemplateError,
    },

    #[error("{role} defaults unavailable: rendered chart has no usable {document}")]
    MissingDocument {
        role: Role,
        document: DocumentPattern,
    },
}

impl DefaultingError {
    /// True when the chart itself could not be produced
    pub fn is_template_failure(&self) -> bool {
        matches!(self, DefaultingError::Template { .. })
    }
}

/// Progress of one defaulting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submitted,
    LabelsNormalized,
    InstrumentationDefaulted,
    RolesResolved,
    RoleDefaultsApplied,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submitted => "submitted",
            Stage::LabelsNormalized => "labels_normalized",
            Stage::InstrumentationDefaulted => "instrumentation_defaulted",
            Stage::RolesResolved => "roles_resolved",
            Stage::RoleDefaultsApplied => "role_defaults_applied",
        };
        f.write_str(name)
    }
}

/// Applies defaults to submitted Agents
///
/// The distribution is fixed at construction. Nothing is cached between
/// calls, so each pass sees the chart as it is served at that moment.
#[derive(Clone)]
pub struct Defaulter {
    provider: Arc<dyn TemplateProvider>,
    distro: Distro,
    metrics: WebhookMetrics,
}

impl Defaulter {
    pub fn new(provider: Arc<dyn TemplateProvider>, distro: Distro) -> Self {
        Self {
            provider,
            distro,
            metrics: WebhookMetrics::new(),
        }
    }

    pub fn distro(&self) -> Distro {
        self.distro
    }

    /// Run every stage against `agent`
    ///
    /// On error the resource may be partially defaulted and must not be
    /// admitted.
    pub async fn apply(&self, agent: &mut Agent) -> Result<Stage, DefaultingError> {
        let name = agent.metadata.name.clone().unwrap_or_default();
        let mut stage = Stage::Submitted;

        normalize_labels(agent);
        advance(&mut stage, Stage::LabelsNormalized, &name);

        default_instrumentation(agent);
        advance(&mut stage, Stage::InstrumentationDefaulted, &name);

        resolve_roles(agent);
        advance(&mut stage, Stage::RolesResolved, &name);

        let enabled: Vec<Role> = agent
            .spec
            .roles()
            .into_iter()
            .filter(|(role, spec)| {
                let enabled = spec.enabled.is_enabled();
                if !enabled {
                    debug!(name = %name, role = %role, "Role disabled, leaving as submitted");
                }
                enabled
            })
            .map(|(role, _)| role)
            .collect();

        for role in enabled {
            match role {
                Role::Agent => self.default_agent(agent).await?,
                Role::ClusterReceiver => self.default_cluster_receiver(agent).await?,
                Role::Gateway => self.default_gateway(agent).await?,
            }
        }
        advance(&mut stage, Stage::RoleDefaultsApplied, &name);

        info!(name = %name, distro = %self.distro, "Agent defaults applied");
        Ok(stage)
    }

    async fn render(&self, agent: &Agent, role: Role) -> Result<RenderedTemplate, DefaultingError> {
        let started = Instant::now();
        let result = self.provider.render(agent).await;
        self.metrics
            .observe_template_render(started.elapsed().as_secs_f64());

        result.map_err(|source| {
            self.metrics.inc_template_errors();
            warn!(role = %role, error = %source, "Chart render failed");
            DefaultingError::Template { role, source }
        })
    }

    async fn default_agent(&self, agent: &mut Agent) -> Result<(), DefaultingError> {
        let role = Role::Agent;
        let rendered = self.render(agent, role).await?;
        let daemonset = require(
            extract::agent_daemonset(&rendered),
            role,
            DocumentPattern::AgentDaemonSet,
        )?;

        let spec = &mut agent.spec.agent;
        spec.host_network = true;
        merge_pod_defaults(spec, &daemonset);
        if spec.security_context.is_none() {
            // needed on OpenShift
            spec.security_context = Some(SecurityContext {
                run_as_user: Some(0),
                ..Default::default()
            });
        }
        merge_container_defaults(spec, daemonset);
        if spec.config.is_empty() {
            spec.config = require_relay(&rendered, role, DocumentPattern::AgentConfig)?;
        }
        Ok(())
    }

    async fn default_cluster_receiver(&self, agent: &mut Agent) -> Result<(), DefaultingError> {
        let role = Role::ClusterReceiver;
        let rendered = self.render(agent, role).await?;
        let deployment = require(
            extract::cluster_receiver_deployment(&rendered),
            role,
            DocumentPattern::ClusterReceiverDeployment,
        )?;

        let spec = &mut agent.spec.cluster_receiver;
        spec.host_network = false;
        merge_container_defaults(spec, deployment);
        if spec.config.is_empty() {
            spec.config = match self.distro {
                Distro::OpenShift => CLUSTER_RECEIVER_CONFIG_OPENSHIFT.to_string(),
                Distro::Default | Distro::Unknown => {
                    require_relay(&rendered, role, DocumentPattern::ClusterReceiverConfig)?
                }
            };
        }
        Ok(())
    }

    async fn default_gateway(&self, agent: &mut Agent) -> Result<(), DefaultingError> {
        let role = Role::Gateway;
        let rendered = self.render(agent, role).await?;
        let deployment = require(
            extract::gateway_deployment(&rendered),
            role,
            DocumentPattern::GatewayDeployment,
        )?;

        let spec = &mut agent.spec.gateway;
        spec.host_network = false;
        merge_pod_defaults(spec, &deployment);
        if spec.replicas.is_none() {
            spec.replicas = deployment.replicas;
        }
        if spec.ports.is_none() {
            spec.ports = Some(require(
                extract::service_ports(&rendered),
                role,
                DocumentPattern::Service,
            )?);
        }
        merge_container_defaults(spec, deployment);
        if spec.config.is_empty() {
            spec.config = require_relay(&rendered, role, DocumentPattern::GatewayConfig)?;
        }
        Ok(())
    }
}

fn advance(stage: &mut Stage, next: Stage, name: &str) {
    debug!(name = %name, from = %stage, to = %next, "Defaulting stage complete");
    *stage = next;
}

fn require<T>(found: Option<T>, role: Role, document: DocumentPattern) -> Result<T, DefaultingError> {
    found.ok_or(DefaultingError::MissingDocument { role, document })
}

fn require_relay(
    rendered: &RenderedTemplate,
    role: Role,
    document: DocumentPattern,
) -> Result<String, DefaultingError> {
    require(extract::relay_config(rendered, document), role, document)
}

/// Ensure the managed-by label is present and non-empty
pub fn normalize_labels(agent: &mut Agent) {
    let labels = agent.metadata.labels.get_or_insert_with(Default::default);
    let managed_by = labels.entry(MANAGED_BY_LABEL.to_string()).or_default();
    if managed_by.is_empty() {
        *managed_by = MANAGED_BY.to_string();
    }
}

pub fn default_instrumentation(agent: &mut Agent) {
    let java = &mut agent.spec.instrumentation.java;
    if java.image.is_empty() {
        java.image = JAVA_AGENT_IMAGE.to_string();
    }
}

/// Make every role's enablement concrete
pub fn resolve_roles(agent: &mut Agent) {
    for role in Role::ALL {
        let spec = agent.spec.role_mut(role);
        spec.enabled = spec.enabled.resolve(role.enabled_by_default());
    }
}

fn merge_if_unset<T>(field: &mut Option<T>, default: Option<T>) {
    if field.is_none() {
        *field = default;
    }
}

fn merge_pod_defaults(spec: &mut CollectorSpec, defaults: &WorkloadDefaults) {
    merge_if_unset(&mut spec.volumes, defaults.volumes.clone());
    merge_if_unset(&mut spec.volume_mounts, defaults.volume_mounts.clone());
    merge_if_unset(&mut spec.tolerations, defaults.tolerations.clone());
}

fn merge_container_defaults(spec: &mut CollectorSpec, defaults: WorkloadDefaults) {
    merge_if_unset(&mut spec.resources.limits, defaults.limits);
    merge_if_unset(&mut spec.env, defaults.env);
}
