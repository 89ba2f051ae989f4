//! Agent admission webhook
//!
//! Serves the mutating and validating admission endpoints for
//! `otel.splunk.com/v1alpha1` Agents, plus health and metrics.

use anyhow::{Context, Result};
use operator_lib::{
    defaults::Defaulter,
    distro::{self, Distro},
    health::{components, HealthRegistry},
    observability::WebhookMetrics,
    probes::{probe_router, ProbeState},
    template::{ChartSource, HelmChartProvider},
    webhook::{webhook_router, WebhookState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::WebhookConfig;

const WEBHOOK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting agent-operator webhook");

    let config = WebhookConfig::load()?;
    let distro = resolve_distro(&config).await?;

    let provider = build_provider(&config)?;
    let chart_source = provider.source().describe();
    let defaulter = Defaulter::new(Arc::new(provider), distro);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TEMPLATE_SOURCE).await;
    health_registry.register(components::WEBHOOK).await;

    let webhook_state = Arc::new(WebhookState::new(defaulter, health_registry.clone()));
    let logger = webhook_state.logger.clone();
    logger.log_startup(WEBHOOK_VERSION, &chart_source);

    let probe_state = Arc::new(ProbeState::new(health_registry.clone(), WebhookMetrics::new()));
    let probe_handle = tokio::spawn(api::serve_probes(config.health_port, probe_router(probe_state)));

    let webhook_app = webhook_router(webhook_state);
    let mut webhook_handle = tokio::spawn(async move {
        api::serve_webhook(config.port, &config.tls_cert_path, &config.tls_key_path, webhook_app).await
    });

    health_registry.set_ready(true).await;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        result = &mut webhook_handle => {
            let reason = match result {
                Ok(Ok(())) => "webhook server exited".to_string(),
                Ok(Err(e)) => format!("{e:#}"),
                Err(e) => format!("webhook task failed: {e}"),
            };
            health_registry.set_unhealthy(components::WEBHOOK, reason.clone()).await;
            logger.log_shutdown(&reason);
            anyhow::bail!(reason);
        }
    }

    webhook_handle.abort();
    probe_handle.abort();
    info!("Shutting down");

    Ok(())
}

/// Configured distro if set, otherwise ask the API server
async fn resolve_distro(config: &WebhookConfig) -> Result<Distro> {
    if let Some(distro) = config.distro_override()? {
        info!(distro = %distro, "Using configured distro");
        return Ok(distro);
    }

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    distro::detect(&client)
        .await
        .context("failed to detect cluster distro")
}

fn build_provider(config: &WebhookConfig) -> Result<HelmChartProvider> {
    let source = match &config.chart_path {
        Some(path) => ChartSource::Local(path.clone()),
        None => ChartSource::remote(&config.chart_url)
            .with_context(|| format!("invalid chart URL '{}'", config.chart_url))?,
    };

    HelmChartProvider::builder()
        .source(source)
        .helm_binary(&config.helm_binary)
        .checksum(config.chart_sha256.clone())
        .timeout(config.render_timeout())
        .build()
        .context("failed to build chart provider")
}
