//! Fixed defaults that do not come from the chart

/// Managed-by label key set on every Agent
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Managed-by label value
pub const MANAGED_BY: &str = "splunk-otel-collector-operator";

/// Java auto-instrumentation image
pub const JAVA_AGENT_IMAGE: &str = "quay.io/signalfx/splunk-otel-instrumentation-java:v1.14.1";

pub const AGENT_CPU: &str = "200m";
pub const AGENT_MEMORY: &str = "500Mi";

pub const CLUSTER_RECEIVER_CPU: &str = "200m";
pub const CLUSTER_RECEIVER_MEMORY: &str = "500Mi";

pub const GATEWAY_CPU: &str = "4";
pub const GATEWAY_MEMORY: &str = "8Gi";

/// Cluster receiver pipeline for clusters without a detected distribution
pub const CLUSTER_RECEIVER_CONFIG: &str = r#"
extensions:
  health_check:
    endpoint: '0.0.0.0:13133'
  memory_ballast:
    size_mib: ${SPLUNK_BALLAST_SIZE_MIB}
receivers:
  k8s_cluster:
    auth_type: serviceAccount
    metadata_exporters:
      - signalfx
  prometheus/self:
    config:
      scrape_configs:
        - job_name: otel-k8s-cluster-receiver
          scrape_interval: 10s
          static_configs:
            - targets:
                - '${MY_POD_IP}:8888'
exporters:
  signalfx:
    access_token: '${SPLUNK_OBSERVABILITY_ACCESS_TOKEN}'
    api_url: 'https://api.${SPLUNK_REALM}.signalfx.com'
    ingest_url: 'https://ingest.${SPLUNK_REALM}.signalfx.com'
    timeout: 10s
  logging: null
  logging/debug:
    loglevel: debug
processors:
  batch: null
  memory_limiter:
    check_interval: 2s
    limit_mib: '${SPLUNK_MEMORY_LIMIT_MIB}'
  resource:
    attributes:
      - action: insert
        key: metric_source
        value: kubernetes
      - action: insert
        key: receiver
        value: k8scluster
      - action: upsert
        key: k8s.cluster.name
        value: '${MY_CLUSTER_NAME}'
      - action: upsert
        key: deployment.environment
        value: '${MY_CLUSTER_NAME}'
  resource/self:
    attributes:
      - action: insert
        key: k8s.node.name
        value: '${MY_NODE_NAME}'
      - action: insert
        key: k8s.pod.name
        value: '${MY_POD_NAME}'
      - action: insert
        key: k8s.pod.uid
        value: '${MY_POD_UID}'
      - action: insert
        key: k8s.namespace.name
        value: '${MY_NAMESPACE}'
  resourcedetection:
    override: false
    timeout: 10s
    detectors:
      - system
      - env
service:
  extensions:
    - health_check
    - memory_ballast
  pipelines:
    metrics:
      receivers:
        - k8s_cluster
      processors:
        - batch
        - resource
        - resourcedetection
      exporters:
        - signalfx
    metrics/self:
      receivers:
        - prometheus/self
      processors:
        - batch
        - resource
        - resource/self
        - resourcedetection
      exporters:
        - signalfx
"#;

/// Cluster receiver pipeline used on OpenShift
pub const CLUSTER_RECEIVER_CONFIG_OPENSHIFT: &str = r#"
extensions:
  health_check:
    endpoint: '0.0.0.0:13133'
  memory_ballast:
    size_mib: ${SPLUNK_BALLAST_SIZE_MIB}
receivers:
  k8s_cluster:
    distribution: openshift
    auth_type: serviceAccount
    metadata_exporters:
      - signalfx
  prometheus/self:
    config:
      scrape_configs:
        - job_name: otel-k8s-cluster-receiver
          scrape_interval: 10s
          static_configs:
            - targets:
                - '${MY_POD_IP}:8888'
exporters:
  signalfx:
    access_token: '${SPLUNK_OBSERVABILITY_ACCESS_TOKEN}'
    api_url: 'https://api.${SPLUNK_REALM}.signalfx.com'
    ingest_url: 'https://ingest.${SPLUNK_REALM}.signalfx.com'
    timeout: 10s
  logging: null
  logging/debug:
    loglevel: debug
processors:
  batch: null
  memory_limiter:
    check_interval: 2s
    limit_mib: '${SPLUNK_MEMORY_LIMIT_MIB}'
  resource:
    attributes:
      - action: insert
        key: metric_source
        value: kubernetes
      - action: insert
        key: receiver
        value: k8scluster
      - action: upsert
        key: k8s.cluster.name
        value: '${MY_CLUSTER_NAME}'
      - action: upsert
        key: deployment.environment
        value: '${MY_CLUSTER_NAME}'
  resource/self:
    attributes:
      - action: insert
        key: k8s.node.name
        value: '${MY_NODE_NAME}'
      - action: insert
        key: k8s.pod.name
        value: '${MY_POD_NAME}'
      - action: insert
        key: k8s.pod.uid
        value: '${MY_POD_UID}'
      - action: insert
        key: k8s.namespace.name
        value: '${MY_NAMESPACE}'
  resourcedetection:
    override: false
    timeout: 10s
    detectors:
      - system
      - env
service:
  extensions:
    - health_check
    - memory_ballast
  pipelines:
    metrics:
      receivers:
        - k8s_cluster
      processors:
        - batch
        - resource
        - resourcedetection
      exporters:
        - signalfx
    metrics/self:
      receivers:
        - prometheus/self
      processors:
        - batch
        - resource
        - resource/self
        - resourcedetection
      exporters:
        - signalfx
"#;
