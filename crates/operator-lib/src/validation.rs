//! Admission validation for Agent resources
//!
//! Every rule is evaluated so that a rejection lists all violations at once.
//! Validation is pure: it never renders the chart and never looks at the
//! cluster distribution.

use crate::crd::{Agent, CollectorSpec};

/// All violations found on one resource, one per line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .0.join("\n"))]
pub struct ValidationError(pub Vec<String>);

impl ValidationError {
    pub fn violations(&self) -> &[String] {
        &self.0
    }
}

/// Collect every violation on `agent`, in rule order
pub fn validate(agent: &Agent) -> Vec<String> {
    let spec = &agent.spec;
    let mut violations = Vec::new();

    // instrumentation has no constraints yet
    check_agent(&spec.agent, &mut violations);
    check_cluster_receiver(&spec.cluster_receiver, &mut violations);
    check_gateway(&spec.gateway, &mut violations);

    violations
}

/// Reject the resource if any rule fails
pub fn validate_agent(agent: &Agent) -> Result<(), ValidationError> {
    let violations = validate(agent);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(violations))
    }
}

fn check_agent(spec: &CollectorSpec, violations: &mut Vec<String>) {
    if spec.replicas.is_some() {
        violations.push("`replicas` is not supported by the agent".to_string());
    }
}

fn check_cluster_receiver(spec: &CollectorSpec, violations: &mut Vec<String>) {
    if spec.replicas.is_some() {
        violations.push("`replicas` is not supported by the clusterReceiver".to_string());
    }
    if spec.host_network {
        violations.push("`hostNetwork` cannot be true for the clusterReceiver".to_string());
    }
}

fn check_gateway(spec: &CollectorSpec, violations: &mut Vec<String>) {
    if spec.host_network {
        violations.push("`hostNetwork` cannot be true for gateway".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::AgentSpec;

    fn agent(spec: AgentSpec) -> Agent {
        Agent::new("demo", spec)
    }

    #[test]
    fn test_empty_agent_is_valid() {
        assert!(validate(&agent(AgentSpec::default())).is_empty());
        assert!(validate_agent(&agent(AgentSpec::default())).is_ok());
    }

    #[test]
    fn test_agent_replicas_rejected() {
        let mut spec = AgentSpec::default();
        spec.agent.replicas = Some(0);

        let violations = validate(&agent(spec));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("replicas"));
        assert!(violations[0].contains("agent"));
    }

    #[test]
    fn test_host_network_rejected_off_the_agent() {
        let mut spec = AgentSpec::default();
        spec.agent.host_network = true;
        spec.cluster_receiver.host_network = true;
        spec.gateway.host_network = true;
        spec.gateway.replicas = Some(3);

        let violations = validate(&agent(spec));
        assert_eq!(
            violations,
            vec![
                "`hostNetwork` cannot be true for the clusterReceiver",
                "`hostNetwork` cannot be true for gateway",
            ]
        );
    }

    #[test]
    fn test_all_violations_are_joined() {
        let mut spec = AgentSpec::default();
        spec.agent.replicas = Some(1);
        spec.cluster_receiver.replicas = Some(2);
        spec.cluster_receiver.host_network = true;
        spec.gateway.host_network = true;

        let err = validate_agent(&agent(spec)).unwrap_err();
        assert_eq!(err.violations().len(), 4);
        assert_eq!(
            err.to_string(),
            "`replicas` is not supported by the agent\n\
             `replicas` is not supported by the clusterReceiver\n\
             `hostNetwork` cannot be true for the clusterReceiver\n\
             `hostNetwork` cannot be true for gateway"
        );
    }
}
