//! Admission-time defaulting and validation for Splunk OpenTelemetry Agents
//!
//! This crate provides:
//! - The `Agent` custom resource and its collector roles
//! - Chart rendering and extraction of per-role defaults
//! - The defaulting and validation engines
//! - The admission webhook router
//! - Health checks and observability

pub mod crd;
pub mod defaults;
pub mod distro;
pub mod extract;
pub mod health;
pub mod observability;
pub mod probes;
pub mod quantity;
pub mod template;
pub mod validation;
pub mod webhook;

#[cfg(test)]
mod testdata;

pub use crd::{Agent, AgentSpec, CollectorSpec, Enablement, Role};
pub use defaults::{Defaulter, DefaultingError};
pub use distro::Distro;
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use observability::{StructuredLogger, WebhookMetrics};
pub use probes::{probe_router, ProbeState};
pub use template::{HelmChartProvider, StaticTemplateProvider, TemplateError, TemplateProvider};
pub use validation::{validate, ValidationError};
pub use webhook::{webhook_router, WebhookError, WebhookState};
