//! Platform flavor detection
//!
//! The distro is resolved once at startup and handed to the defaulting
//! engine by value. Nothing writes it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// API group served only by OpenShift clusters
pub const OPENSHIFT_API_GROUP: &str = "config.openshift.io";

/// Detected Kubernetes distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distro {
    #[default]
    Unknown,
    Default,
    /// Restricted platform; runs collectors under stricter security constraints
    OpenShift,
}

impl Distro {
    /// Classify a cluster from the API group names it serves
    pub fn from_api_groups<'a>(groups: impl IntoIterator<Item = &'a str>) -> Self {
        if groups.into_iter().any(|g| g == OPENSHIFT_API_GROUP) {
            Distro::OpenShift
        } else {
            Distro::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Distro::Unknown => "unknown",
            Distro::Default => "default",
            Distro::OpenShift => "openshift",
        }
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown distro '{0}', expected one of: unknown, default, openshift")]
pub struct ParseDistroError(String);

impl FromStr for Distro {
    type Err = ParseDistroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Distro::Unknown),
            "default" => Ok(Distro::Default),
            "openshift" => Ok(Distro::OpenShift),
            other => Err(ParseDistroError(other.to_string())),
        }
    }
}

/// Ask the API server which groups it serves and classify the cluster
pub async fn detect(client: &kube::Client) -> Result<Distro, kube::Error> {
    let groups = client.list_api_groups().await?;
    let distro = Distro::from_api_groups(groups.groups.iter().map(|g| g.name.as_str()));
    tracing::info!(distro = %distro, groups = groups.groups.len(), "Detected cluster distro");
    Ok(distro)
}
