//! Webhook configuration

use anyhow::{Context, Result};
use operator_lib::distro::Distro;
use operator_lib::template::DEFAULT_CHART_URL;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Webhook configuration, read from `WEBHOOK_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// TLS port for the admission endpoints
    #[serde(default = "default_port")]
    pub port: u16,

    /// Plain HTTP port for health and metrics
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: PathBuf,

    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: PathBuf,

    #[serde(default = "default_chart_url")]
    pub chart_url: String,

    /// Local chart archive, takes precedence over `chart_url`
    #[serde(default)]
    pub chart_path: Option<PathBuf>,

    /// Expected SHA256 of the chart archive
    #[serde(default)]
    pub chart_sha256: Option<String>,

    #[serde(default = "default_helm_binary")]
    pub helm_binary: PathBuf,

    #[serde(default = "default_render_timeout")]
    pub render_timeout_secs: u64,

    /// Skip detection and use this distribution
    #[serde(default)]
    pub distro: Option<String>,
}

fn default_port() -> u16 {
    9443
}

fn default_health_port() -> u16 {
    8080
}

fn default_tls_cert_path() -> PathBuf {
    PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.crt")
}

fn default_tls_key_path() -> PathBuf {
    PathBuf::from("/tmp/k8s-webhook-server/serving-certs/tls.key")
}

fn default_chart_url() -> String {
    DEFAULT_CHART_URL.to_string()
}

fn default_helm_binary() -> PathBuf {
    PathBuf::from("helm")
}

fn default_render_timeout() -> u64 {
    10
}

impl WebhookConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("WEBHOOK"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read webhook configuration")?;

        config
            .try_deserialize()
            .context("invalid webhook configuration")
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Distribution override, if one is configured
    pub fn distro_override(&self) -> Result<Option<Distro>> {
        self.distro
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.parse::<Distro>().context("invalid WEBHOOK_DISTRO"))
            .transpose()
    }
}
