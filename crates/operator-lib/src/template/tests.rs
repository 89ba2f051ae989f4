//! Tests for chart loading and rendering

use super::*;
use crate::crd::{AgentSpec, Enablement};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::time::Duration;
use tempfile::TempDir;

fn chart_tgz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

const CHART_YAML: &str = "apiVersion: v2\nname: splunk-otel-collector\nversion: 0.59.0\nappVersion: 0.59.1\n";

fn resolved_agent(name: &str) -> Agent {
    let mut spec = AgentSpec {
        cluster_name: "prod1".to_string(),
        ..Default::default()
    };
    spec.agent.enabled = Enablement::Enabled;
    spec.cluster_receiver.enabled = Enablement::Enabled;
    spec.gateway.enabled = Enablement::Disabled;
    Agent::new(name, spec)
}

#[test]
fn test_render_values_use_resolved_roles() {
    let values = RenderValues::for_agent(&resolved_agent("demo"));

    assert_eq!(values.release_name, "demo");
    assert_eq!(values.values["clusterName"], "prod1");
    assert_eq!(values.values["fullnameOverride"], "demo");
    assert_eq!(values.values["logsEngine"], "otel");
    assert_eq!(values.values["agent"]["enabled"], true);
    assert_eq!(values.values["clusterReceiver"]["enabled"], true);
    assert_eq!(values.values["gateway"]["enabled"], false);
    assert_eq!(values.values["secret"]["create"], false);
    assert_eq!(values.values["secret"]["name"], ACCESS_TOKEN_SECRET);
    assert_eq!(
        values.values["splunkObservability"]["accessToken"],
        "${SPLUNK_OBSERVABILITY_ACCESS_TOKEN}"
    );
}

#[test]
fn test_release_name_falls_back() {
    let mut agent = resolved_agent("");
    agent.metadata.name = None;
    agent.metadata.generate_name = Some("collector-".to_string());
    assert_eq!(RenderValues::for_agent(&agent).release_name, "collector");

    agent.metadata.generate_name = None;
    assert_eq!(
        RenderValues::for_agent(&agent).release_name,
        FALLBACK_RELEASE_NAME
    );
}

#[test]
fn test_rendered_template_matching_is_name_ordered() {
    let rendered = RenderedTemplate::new(
        [
            ("c/templates/service.yaml", "b"),
            ("c/templates/headless-service.yaml", "a"),
            ("c/templates/daemonset.yaml", "x"),
        ]
        .into_iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect(),
    );

    let pattern = Regex::new(r"service\.yaml$").unwrap();
    let names: Vec<&str> = rendered.matching(&pattern).map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["c/templates/headless-service.yaml", "c/templates/service.yaml"]
    );
    assert_eq!(rendered.get("c/templates/daemonset.yaml"), Some("x"));
}

#[tokio::test]
async fn test_static_provider_counts_renders() {
    let provider = StaticTemplateProvider::from_documents([("a.yaml", "kind: A")]);
    let agent = resolved_agent("demo");

    let first = provider.render(&agent).await.unwrap();
    provider.render(&agent).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(provider.render_count(), 2);
}

#[test]
fn test_chart_archive_unpack() {
    let bytes = chart_tgz(&[
        ("splunk-otel-collector/Chart.yaml", CHART_YAML),
        ("splunk-otel-collector/values.yaml", "clusterName: \"\"\n"),
        ("splunk-otel-collector/templates/daemonset.yaml", "kind: DaemonSet\n"),
    ]);

    let archive = ChartArchive::unpack(&bytes).unwrap();

    assert_eq!(archive.metadata().name, "splunk-otel-collector");
    assert_eq!(archive.metadata().version, CHART_VERSION);
    assert_eq!(archive.metadata().app_version.as_deref(), Some("0.59.1"));
    assert!(archive.chart_dir().join("templates/daemonset.yaml").is_file());
    assert!(archive.chart_dir().starts_with(archive.scratch_dir()));
}

#[test]
fn test_chart_archive_without_chart_yaml_is_rejected() {
    let bytes = chart_tgz(&[("chart/values.yaml", "a: 1\n")]);
    let err = ChartArchive::unpack(&bytes).unwrap_err();
    assert!(matches!(err, TemplateError::Archive(_)));
}

#[test]
fn test_garbage_archive_is_rejected() {
    let err = ChartArchive::unpack(b"definitely not gzip").unwrap_err();
    assert!(matches!(err, TemplateError::Archive(_)));
}

#[tokio::test]
async fn test_missing_local_chart() {
    let provider = HelmChartProvider::builder()
        .source(ChartSource::Local("/nonexistent/chart.tgz".into()))
        .build()
        .unwrap();

    let err = provider.render(&resolved_agent("demo")).await.unwrap_err();
    assert!(matches!(err, TemplateError::ReadLocal { .. }));
}

#[tokio::test]
async fn test_checksum_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chart.tgz");
    std::fs::write(&path, chart_tgz(&[("c/Chart.yaml", CHART_YAML)])).unwrap();

    let provider = HelmChartProvider::builder()
        .source(ChartSource::Local(path))
        .checksum(Some("00".repeat(32)))
        .build()
        .unwrap();

    let err = provider.render(&resolved_agent("demo")).await.unwrap_err();
    assert!(matches!(err, TemplateError::Checksum { .. }));
}

#[tokio::test]
async fn test_missing_helm_binary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chart.tgz");
    std::fs::write(&path, chart_tgz(&[("c/Chart.yaml", CHART_YAML)])).unwrap();

    let provider = HelmChartProvider::builder()
        .source(ChartSource::Local(path))
        .helm_binary("/nonexistent/bin/helm")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let err = provider.render(&resolved_agent("demo")).await.unwrap_err();
    assert!(matches!(err, TemplateError::HelmUnavailable { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_render_through_helm_binary() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let chart = dir.path().join("chart.tgz");
    std::fs::write(&chart, chart_tgz(&[("c/Chart.yaml", CHART_YAML)])).unwrap();

    // stands in for `helm template`, echoing its release name into the output
    let helm = dir.path().join("helm");
    std::fs::write(
        &helm,
        "#!/bin/sh\n[ \"$1\" = template ] || exit 3\nprintf '%s\\n' '---' '# Source: c/templates/configmap-agent.yaml' 'apiVersion: v1' 'kind: ConfigMap' 'metadata:' \"  name: $2\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&helm, std::fs::Permissions::from_mode(0o755)).unwrap();

    let provider = HelmChartProvider::builder()
        .source(ChartSource::Local(chart))
        .helm_binary(&helm)
        .build()
        .unwrap();

    let rendered = provider.render(&resolved_agent("demo")).await.unwrap();
    let doc = rendered.get("c/templates/configmap-agent.yaml").unwrap();
    assert!(doc.contains("kind: ConfigMap"));
    assert!(doc.contains("name: demo"));
}
