//! Packaged chart rendering
//!
//! This module provides:
//! - The [`TemplateProvider`] seam used by the defaulting engine
//! - A helm-chart backed provider that downloads, unpacks and renders the
//!   pinned collector chart for every call
//! - A static provider serving pre-rendered documents

mod chart;
mod output;

#[cfg(test)]
mod tests;

pub use chart::{ChartArchive, ChartMetadata, ChartSource, HelmChartProvider, HelmChartProviderBuilder};
pub use output::split_rendered_output;

use crate::crd::Agent;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Pinned chart version the defaults are derived from
pub const CHART_VERSION: &str = "0.59.0";

/// Release archive of the pinned chart
pub const DEFAULT_CHART_URL: &str = "https://github.com/signalfx/splunk-otel-collector-chart/releases/download/splunk-otel-collector-0.59.0/splunk-otel-collector-0.59.0.tgz";

/// Release name used when the resource has no name yet
pub const FALLBACK_RELEASE_NAME: &str = "splunk-otel-collector";

/// Secret the collectors read the access token from
pub const ACCESS_TOKEN_SECRET: &str = "splunk-access-token";

/// Errors that make defaults unavailable
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to fetch chart from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read local chart {}: {source}", path.display())]
    ReadLocal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chart checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("failed to load chart archive: {0}")]
    Archive(String),

    #[error("failed to prepare render workspace: {0}")]
    Workspace(String),

    #[error("helm binary {} unavailable: {source}", binary.display())]
    HelmUnavailable {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chart render failed ({status}): {stderr}")]
    Render { status: String, stderr: String },

    #[error("chart render timed out after {0:?}")]
    Timeout(Duration),
}

/// Rendered chart documents keyed by their chart-relative source path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedTemplate {
    documents: BTreeMap<String, String>,
}

impl RenderedTemplate {
    pub fn new(documents: BTreeMap<String, String>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.documents.get(name).map(String::as_str)
    }

    /// Documents whose name matches the pattern, in name order
    pub fn matching<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.documents
            .iter()
            .filter(move |(name, _)| pattern.is_match(name))
            .map(|(name, text)| (name.as_str(), text.as_str()))
    }
}

/// Release name and override values passed to the chart
#[derive(Debug, Clone, PartialEq)]
pub struct RenderValues {
    pub release_name: String,
    pub values: serde_json::Value,
}

impl RenderValues {
    /// Build render values for an Agent whose roles are already resolved
    ///
    /// Only the cluster name, the resource name and the role switches come
    /// from the resource; everything else is fixed.
    pub fn for_agent(agent: &Agent) -> Self {
        let release_name = release_name(agent);
        let spec = &agent.spec;

        let values = json!({
            "clusterName": spec.cluster_name,
            "fullnameOverride": release_name,
            // only the otel logs engine is supported by the operator
            "logsEngine": "otel",
            "splunkObservability": {
                "metricsEnabled": true,
                "tracesEnabled": true,
                "logsEnabled": true,
                "accessToken": "${SPLUNK_OBSERVABILITY_ACCESS_TOKEN}",
                "realm": "${SPLUNK_REALM}",
            },
            "agent": { "enabled": spec.agent.enabled.is_enabled() },
            "clusterReceiver": { "enabled": spec.cluster_receiver.enabled.is_enabled() },
            "gateway": { "enabled": spec.gateway.enabled.is_enabled() },
            "secret": {
                "create": false,
                "name": ACCESS_TOKEN_SECRET,
            },
        });

        Self {
            release_name,
            values,
        }
    }
}

fn release_name(agent: &Agent) -> String {
    let meta = &agent.metadata;
    meta.name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| {
            meta.generate_name
                .as_deref()
                .map(|g| g.trim_end_matches('-'))
                .filter(|g| !g.is_empty())
        })
        .unwrap_or(FALLBACK_RELEASE_NAME)
        .to_string()
}

/// Source of rendered default manifests
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    /// Render the chart for the given resource
    async fn render(&self, agent: &Agent) -> Result<RenderedTemplate, TemplateError>;
}

/// Provider that serves a fixed set of documents
///
/// Useful for air-gapped installs with a pre-rendered chart and for tests.
#[derive(Debug, Default)]
pub struct StaticTemplateProvider {
    documents: BTreeMap<String, String>,
    renders: AtomicUsize,
}

impl StaticTemplateProvider {
    pub fn new(documents: BTreeMap<String, String>) -> Self {
        Self {
            documents,
            renders: AtomicUsize::new(0),
        }
    }

    /// Build from `(name, text)` pairs
    pub fn from_documents<N, T>(documents: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::new(
            documents
                .into_iter()
                .map(|(n, t)| (n.into(), t.into()))
                .collect(),
        )
    }

    /// Number of times `render` has been called
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TemplateProvider for StaticTemplateProvider {
    async fn render(&self, _agent: &Agent) -> Result<RenderedTemplate, TemplateError> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        Ok(RenderedTemplate::new(self.documents.clone()))
    }
}
