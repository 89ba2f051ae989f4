//! HTTP servers: TLS admission endpoints plus plain health and metrics

use anyhow::{Context, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Serve the admission router over TLS
pub async fn serve_webhook(port: u16, cert: &Path, key: &Path, app: Router) -> Result<()> {
    let tls_config = RustlsConfig::from_pem_file(cert, key)
        .await
        .with_context(|| format!("failed to load TLS material from {}", cert.display()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting admission webhook server");

    axum_server::bind_rustls(addr, tls_config)
        .serve(app.into_make_service())
        .await
        .context("admission webhook server failed")?;

    Ok(())
}

/// Serve health and metrics endpoints over plain HTTP
pub async fn serve_probes(port: u16, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting health server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
