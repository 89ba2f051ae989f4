//! Tests for default extraction

use super::*;
use crate::testdata::{fixture, rendered_documents, CHART_PREFIX};

fn rendered() -> RenderedTemplate {
    RenderedTemplate::new(rendered_documents().into_iter().collect())
}

fn rendered_with(extra: &[(&str, &str)]) -> RenderedTemplate {
    let mut documents: BTreeMap<String, String> = rendered_documents().into_iter().collect();
    for (name, text) in extra {
        documents.insert(name.to_string(), text.to_string());
    }
    RenderedTemplate::new(documents)
}

#[test]
fn test_patterns_are_anchored_on_path_separator() {
    let service = DocumentPattern::Service.regex();
    assert!(service.is_match("splunk-otel-collector/templates/service.yaml"));
    assert!(service.is_match("service.yaml"));
    assert!(!service.is_match("splunk-otel-collector/templates/headless-service.yaml"));

    let daemonset = DocumentPattern::AgentDaemonSet.regex();
    assert!(daemonset.is_match("splunk-otel-collector/templates/daemonset.yaml"));
    assert!(!daemonset.is_match("splunk-otel-collector/templates/daemonset.yaml.bak"));
}

#[test]
fn test_agent_daemonset_strips_config_mount() {
    let defaults = agent_daemonset(&rendered()).unwrap();

    let mounts = defaults.volume_mounts.unwrap();
    assert_eq!(mounts.len(), 6);
    assert!(mounts.iter().all(|m| m.name != AGENT_CONFIG_VOLUME));

    // the volume itself is kept
    let volumes = defaults.volumes.unwrap();
    assert!(volumes.iter().any(|v| v.name == AGENT_CONFIG_VOLUME));

    assert_eq!(defaults.tolerations.unwrap().len(), 2);
    assert_eq!(defaults.replicas, None);

    let limits = defaults.limits.unwrap();
    assert_eq!(limits["cpu"].0, "200m");
    assert_eq!(limits["memory"].0, "500Mi");

    let env = defaults.env.unwrap();
    assert_eq!(env[0].name, "SPLUNK_MEMORY_TOTAL_MIB");
}

#[test]
fn test_gateway_deployment_defaults() {
    let defaults = gateway_deployment(&rendered()).unwrap();

    assert_eq!(defaults.replicas, Some(3));
    // the config mount was the only one
    assert_eq!(defaults.volume_mounts, None);
    assert_eq!(defaults.limits.unwrap()["cpu"].0, "4");
}

#[test]
fn test_cluster_receiver_keeps_mounts() {
    let defaults = cluster_receiver_deployment(&rendered()).unwrap();

    assert_eq!(defaults.replicas, Some(1));
    assert_eq!(defaults.volume_mounts.unwrap()[0].name, "collector-configmap");
}

#[test]
fn test_relay_config() {
    let rendered = rendered();

    let agent = relay_config(&rendered, DocumentPattern::AgentConfig).unwrap();
    assert!(agent.contains("kubeletstats:"));

    let receiver = relay_config(&rendered, DocumentPattern::ClusterReceiverConfig).unwrap();
    assert!(receiver.contains("k8s_cluster:"));
    assert!(!receiver.contains("kubeletstats:"));

    let gateway = relay_config(&rendered, DocumentPattern::GatewayConfig).unwrap();
    assert!(gateway.contains("signalfx:\n    endpoint: 0.0.0.0:9943"));
}

#[test]
fn test_service_ports() {
    let ports = service_ports(&rendered()).unwrap();
    let names: Vec<_> = ports.iter().filter_map(|p| p.name.as_deref()).collect();
    assert_eq!(names, vec!["http-forwarder", "jaeger-grpc", "otlp", "otlp-http", "signalfx"]);
}

#[test]
fn test_missing_document_yields_none() {
    let rendered = RenderedTemplate::new(
        [(
            format!("{CHART_PREFIX}configmap-agent.yaml"),
            fixture("configmap-agent.yaml").to_string(),
        )]
        .into_iter()
        .collect(),
    );

    assert!(agent_daemonset(&rendered).is_none());
    assert!(service_ports(&rendered).is_none());
    assert!(extract(&rendered, DocumentPattern::GatewayConfig).is_none());
}

#[test]
fn test_undecodable_document_is_skipped() {
    // sorts before the real daemonset and fails to decode
    let rendered = rendered_with(&[("a/daemonset.yaml", "kind: DaemonSet\nspec: [broken\n")]);

    let defaults = agent_daemonset(&rendered).unwrap();
    assert_eq!(defaults.tolerations.unwrap().len(), 2);
}

#[test]
fn test_wrong_kind_is_skipped() {
    let rendered = rendered_with(&[(
        "a/service.yaml",
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n",
    )]);

    assert!(service_ports(&rendered).is_some());
    assert!(matches!(
        extract(&rendered, DocumentPattern::Service),
        Some(Manifest::ConfigDocument(_))
    ));
}

#[test]
fn test_config_document_without_relay() {
    let rendered = RenderedTemplate::new(
        [(
            "c/configmap-gateway.yaml".to_string(),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\ndata:\n  other: y\n".to_string(),
        )]
        .into_iter()
        .collect(),
    );

    assert_eq!(relay_config(&rendered, DocumentPattern::GatewayConfig), None);
}
