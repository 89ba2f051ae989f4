//! Kind-dispatching decoder for rendered chart documents

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodSpec, Service};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("document is empty")]
    Empty,

    #[error("document has no kind")]
    MissingKind,

    #[error("unsupported kind '{0}'")]
    UnsupportedKind(String),
}

/// A rendered document the defaulting engine knows how to use
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Workload(Workload),
    ConfigDocument(ConfigMap),
    Service(Service),
}

/// Pod-owning manifests
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    DaemonSet(Box<DaemonSet>),
    Deployment(Box<Deployment>),
}

impl Manifest {
    /// Decode every document in `text`, stopping at the first one that is
    /// a supported kind. Returns the last error when none decode.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let mut last_err = DecodeError::Empty;
        for document in serde_yaml::Deserializer::from_str(text) {
            let value = match serde_yaml::Value::deserialize(document) {
                Ok(serde_yaml::Value::Null) => continue,
                Ok(value) => value,
                Err(e) => {
                    last_err = e.into();
                    continue;
                }
            };
            match Self::from_value(value) {
                Ok(manifest) => return Ok(manifest),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    fn from_value(mut value: serde_yaml::Value) -> Result<Self, DecodeError> {
        normalize_quantities(&mut value);
        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .ok_or(DecodeError::MissingKind)?
            .to_string();

        let manifest = match kind.as_str() {
            "DaemonSet" => Manifest::Workload(Workload::DaemonSet(Box::new(serde_yaml::from_value(value)?))),
            "Deployment" => Manifest::Workload(Workload::Deployment(Box::new(serde_yaml::from_value(value)?))),
            "ConfigMap" => Manifest::ConfigDocument(serde_yaml::from_value(value)?),
            "Service" => Manifest::Service(serde_yaml::from_value(value)?),
            _ => return Err(DecodeError::UnsupportedKind(kind)),
        };
        Ok(manifest)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Workload(Workload::DaemonSet(_)) => "DaemonSet",
            Manifest::Workload(Workload::Deployment(_)) => "Deployment",
            Manifest::ConfigDocument(_) => "ConfigMap",
            Manifest::Service(_) => "Service",
        }
    }

    pub fn into_workload(self) -> Option<Workload> {
        match self {
            Manifest::Workload(w) => Some(w),
            _ => None,
        }
    }

    pub fn into_config_document(self) -> Option<ConfigMap> {
        match self {
            Manifest::ConfigDocument(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_service(self) -> Option<Service> {
        match self {
            Manifest::Service(s) => Some(s),
            _ => None,
        }
    }
}

/// Quantities may be rendered as bare YAML numbers (`cpu: 4`); the typed
/// `Quantity` only accepts strings.
fn normalize_quantities(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let is_resource_list = matches!(key.as_str(), Some("limits" | "requests"));
                match child {
                    serde_yaml::Value::Mapping(list) if is_resource_list => {
                        for (_, quantity) in list.iter_mut() {
                            if let serde_yaml::Value::Number(n) = quantity {
                                *quantity = serde_yaml::Value::String(n.to_string());
                            }
                        }
                    }
                    _ => normalize_quantities(child),
                }
            }
        }
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(normalize_quantities),
        _ => {}
    }
}

impl Workload {
    pub fn pod_spec(&self) -> Option<&PodSpec> {
        match self {
            Workload::DaemonSet(d) => d.spec.as_ref()?.template.spec.as_ref(),
            Workload::Deployment(d) => d.spec.as_ref()?.template.spec.as_ref(),
        }
    }

    fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        match self {
            Workload::DaemonSet(d) => d.spec.as_mut()?.template.spec.as_mut(),
            Workload::Deployment(d) => d.spec.as_mut()?.template.spec.as_mut(),
        }
    }

    /// Collector pods carry a single container
    pub fn first_container(&self) -> Option<&Container> {
        self.pod_spec()?.containers.first()
    }

    /// Replica count; daemonsets have none
    pub fn replicas(&self) -> Option<i32> {
        match self {
            Workload::DaemonSet(_) => None,
            Workload::Deployment(d) => d.spec.as_ref()?.replicas,
        }
    }

    /// Drop every mount with the given name from the first container
    pub fn strip_volume_mount(&mut self, name: &str) {
        let Some(container) = self.pod_spec_mut().and_then(|p| p.containers.first_mut()) else {
            return;
        };
        if let Some(mounts) = container.volume_mounts.as_mut() {
            mounts.retain(|m| m.name != name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAEMONSET: &str = r#"
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: demo-agent
spec:
  selector:
    matchLabels:
      app: demo
  template:
    spec:
      containers:
        - name: otel-collector
          volumeMounts:
            - name: otel-configmap
              mountPath: /conf
            - name: hostfs
              mountPath: /hostfs
"#;

    #[test]
    fn test_decode_dispatches_on_kind() {
        let manifest = Manifest::decode(DAEMONSET).unwrap();
        assert_eq!(manifest.kind(), "DaemonSet");

        let cm = Manifest::decode("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\ndata:\n  relay: abc\n").unwrap();
        assert_eq!(cm.kind(), "ConfigMap");
        assert!(cm.into_config_document().is_some());
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(Manifest::decode(""), Err(DecodeError::Empty)));
        assert!(matches!(Manifest::decode("foo: bar\n"), Err(DecodeError::MissingKind)));
        assert!(matches!(
            Manifest::decode("apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n"),
            Err(DecodeError::UnsupportedKind(k)) if k == "Secret"
        ));
        assert!(matches!(Manifest::decode("kind: [unclosed"), Err(DecodeError::Yaml(_))));
    }

    #[test]
    fn test_decode_skips_to_first_supported_document() {
        let text = format!("apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n---\n{DAEMONSET}");
        assert_eq!(Manifest::decode(&text).unwrap().kind(), "DaemonSet");
    }

    #[test]
    fn test_numeric_quantities_are_accepted() {
        let text = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: gw
spec:
  replicas: 3
  selector:
    matchLabels:
      app: gw
  template:
    spec:
      containers:
        - name: otel-collector
          resources:
            limits:
              cpu: 4
              memory: 8Gi
"#;
        let workload = Manifest::decode(text).unwrap().into_workload().unwrap();
        let limits = workload
            .first_container()
            .and_then(|c| c.resources.as_ref())
            .and_then(|r| r.limits.as_ref())
            .unwrap();

        assert_eq!(limits["cpu"].0, "4");
        assert_eq!(limits["memory"].0, "8Gi");
        assert_eq!(workload.replicas(), Some(3));
    }

    #[test]
    fn test_strip_volume_mount() {
        let mut workload = Manifest::decode(DAEMONSET).unwrap().into_workload().unwrap();
        workload.strip_volume_mount("otel-configmap");

        let mounts = workload.first_container().unwrap().volume_mounts.clone().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].name, "hostfs");
        assert_eq!(workload.replicas(), None);
    }
}
