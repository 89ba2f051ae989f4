//! Helm chart backed template provider
//!
//! Every render downloads (or reads) the chart archive, unpacks it into a
//! scratch directory and runs `helm template` against it. Nothing is cached
//! between calls.

use super::{split_rendered_output, RenderValues, RenderedTemplate, TemplateError, TemplateProvider, DEFAULT_CHART_URL};
use crate::crd::Agent;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

const VALUES_FILE: &str = "operator-values.json";

/// Where the chart archive comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ChartSource {
    Remote(Url),
    Local(PathBuf),
}

impl ChartSource {
    /// The pinned release archive
    pub fn pinned() -> Self {
        ChartSource::Remote(Url::parse(DEFAULT_CHART_URL).expect("pinned chart URL is valid"))
    }

    pub fn remote(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(ChartSource::Remote)
    }

    pub fn describe(&self) -> String {
        match self {
            ChartSource::Remote(url) => url.to_string(),
            ChartSource::Local(path) => path.display().to_string(),
        }
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<Vec<u8>, TemplateError> {
        match self {
            ChartSource::Remote(url) => {
                let fetch_err = |source| TemplateError::Fetch {
                    url: url.to_string(),
                    source,
                };
                let response = http
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(fetch_err)?;
                let bytes = response.bytes().await.map_err(fetch_err)?;
                Ok(bytes.to_vec())
            }
            ChartSource::Local(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| TemplateError::ReadLocal {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }
}

/// Subset of `Chart.yaml` we care about
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// A chart archive unpacked into a scratch directory
///
/// The directory is removed when the archive is dropped.
#[derive(Debug)]
pub struct ChartArchive {
    workdir: TempDir,
    chart_dir: PathBuf,
    metadata: ChartMetadata,
}

impl ChartArchive {
    /// Unpack a gzipped chart tarball and locate its `Chart.yaml`
    pub fn unpack(bytes: &[u8]) -> Result<Self, TemplateError> {
        let archive_err = |e: std::io::Error| TemplateError::Archive(e.to_string());

        let workdir = tempfile::Builder::new()
            .prefix("agent-chart-")
            .tempdir()
            .map_err(archive_err)?;

        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive.unpack(workdir.path()).map_err(archive_err)?;

        let chart_dir = find_chart_dir(workdir.path())?;
        let raw = std::fs::read_to_string(chart_dir.join("Chart.yaml")).map_err(archive_err)?;
        let metadata: ChartMetadata = serde_yaml::from_str(&raw)
            .map_err(|e| TemplateError::Archive(format!("invalid Chart.yaml: {e}")))?;

        Ok(Self {
            workdir,
            chart_dir,
            metadata,
        })
    }

    pub fn chart_dir(&self) -> &Path {
        &self.chart_dir
    }

    pub fn metadata(&self) -> &ChartMetadata {
        &self.metadata
    }

    /// Scratch directory next to the chart, removed with the archive
    pub fn scratch_dir(&self) -> &Path {
        self.workdir.path()
    }
}

/// Charts are packaged as `<name>/Chart.yaml`; accept a root-level one too
fn find_chart_dir(root: &Path) -> Result<PathBuf, TemplateError> {
    if root.join("Chart.yaml").is_file() {
        return Ok(root.to_path_buf());
    }

    let entries = std::fs::read_dir(root).map_err(|e| TemplateError::Archive(e.to_string()))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.join("Chart.yaml").is_file())
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| TemplateError::Archive("archive does not contain a Chart.yaml".to_string()))
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Template provider that renders the collector helm chart
#[derive(Debug, Clone)]
pub struct HelmChartProvider {
    source: ChartSource,
    helm_binary: PathBuf,
    checksum: Option<String>,
    timeout: Duration,
    http: reqwest::Client,
}

impl HelmChartProvider {
    pub fn builder() -> HelmChartProviderBuilder {
        HelmChartProviderBuilder::default()
    }

    pub fn source(&self) -> &ChartSource {
        &self.source
    }

    async fn render_chart(&self, values: &RenderValues) -> Result<RenderedTemplate, TemplateError> {
        let started = Instant::now();
        let bytes = self.source.fetch(&self.http).await?;
        debug!(
            source = %self.source.describe(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched chart archive"
        );

        if let Some(expected) = &self.checksum {
            let actual = compute_checksum(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(TemplateError::Checksum {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let archive = tokio::task::spawn_blocking(move || ChartArchive::unpack(&bytes))
            .await
            .map_err(|e| TemplateError::Archive(format!("unpack task failed: {e}")))??;
        debug!(
            chart = %archive.metadata().name,
            version = %archive.metadata().version,
            "Loaded chart archive"
        );

        let values_path = archive.scratch_dir().join(VALUES_FILE);
        let values_json = serde_json::to_vec(&values.values)
            .map_err(|e| TemplateError::Workspace(format!("failed to encode values: {e}")))?;
        tokio::fs::write(&values_path, values_json)
            .await
            .map_err(|e| TemplateError::Workspace(format!("failed to write values: {e}")))?;

        let output = Command::new(&self.helm_binary)
            .arg("template")
            .arg(&values.release_name)
            .arg(archive.chart_dir())
            .arg("--values")
            .arg(&values_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TemplateError::HelmUnavailable {
                binary: self.helm_binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TemplateError::Render {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stream = String::from_utf8_lossy(&output.stdout);
        let rendered = RenderedTemplate::new(split_rendered_output(&stream));
        info!(
            release = %values.release_name,
            documents = rendered.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered chart"
        );
        Ok(rendered)
    }
}

#[async_trait]
impl TemplateProvider for HelmChartProvider {
    async fn render(&self, agent: &Agent) -> Result<RenderedTemplate, TemplateError> {
        let values = RenderValues::for_agent(agent);
        tokio::time::timeout(self.timeout, self.render_chart(&values))
            .await
            .map_err(|_| TemplateError::Timeout(self.timeout))?
    }
}

/// Builder for [`HelmChartProvider`]
#[derive(Debug, Clone)]
pub struct HelmChartProviderBuilder {
    source: ChartSource,
    helm_binary: PathBuf,
    checksum: Option<String>,
    timeout: Duration,
}

impl Default for HelmChartProviderBuilder {
    fn default() -> Self {
        Self {
            source: ChartSource::pinned(),
            helm_binary: PathBuf::from("helm"),
            checksum: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl HelmChartProviderBuilder {
    pub fn source(mut self, source: ChartSource) -> Self {
        self.source = source;
        self
    }

    pub fn helm_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.helm_binary = binary.into();
        self
    }

    /// Pin the archive to a SHA256 hex digest
    pub fn checksum(mut self, checksum: Option<String>) -> Self {
        self.checksum = checksum.filter(|c| !c.trim().is_empty());
        self
    }

    /// Deadline for one whole fetch-unpack-render cycle
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HelmChartProvider, TemplateError> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| TemplateError::Fetch {
                url: self.source.describe(),
                source,
            })?;

        Ok(HelmChartProvider {
            source: self.source,
            helm_binary: self.helm_binary,
            checksum: self.checksum,
            timeout: self.timeout,
            http,
        })
    }
}
