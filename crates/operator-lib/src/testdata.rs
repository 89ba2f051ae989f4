//! Rendered chart fixtures shared by unit tests

use crate::template::StaticTemplateProvider;

pub const CHART_PREFIX: &str = "splunk-otel-collector/templates/";

pub const FIXTURES: &[(&str, &str)] = &[
    ("daemonset.yaml", include_str!("../testdata/rendered/daemonset.yaml")),
    (
        "deployment-cluster-receiver.yaml",
        include_str!("../testdata/rendered/deployment-cluster-receiver.yaml"),
    ),
    (
        "deployment-gateway.yaml",
        include_str!("../testdata/rendered/deployment-gateway.yaml"),
    ),
    ("configmap-agent.yaml", include_str!("../testdata/rendered/configmap-agent.yaml")),
    (
        "configmap-cluster-receiver.yaml",
        include_str!("../testdata/rendered/configmap-cluster-receiver.yaml"),
    ),
    ("configmap-gateway.yaml", include_str!("../testdata/rendered/configmap-gateway.yaml")),
    ("service.yaml", include_str!("../testdata/rendered/service.yaml")),
];

/// Fixture documents keyed the way a chart render names them
pub fn rendered_documents() -> Vec<(String, String)> {
    rendered_documents_without(&[])
}

/// Fixtures without the named files
pub fn rendered_documents_without(skip: &[&str]) -> Vec<(String, String)> {
    FIXTURES
        .iter()
        .filter(|(file, _)| !skip.contains(file))
        .map(|(file, text)| (format!("{CHART_PREFIX}{file}"), text.to_string()))
        .collect()
}

pub fn chart_provider() -> StaticTemplateProvider {
    StaticTemplateProvider::from_documents(rendered_documents())
}

pub fn fixture(file: &str) -> &'static str {
    FIXTURES
        .iter()
        .find(|(name, _)| *name == file)
        .map(|(_, text)| *text)
        .unwrap_or_else(|| panic!("no fixture named {file}"))
}
