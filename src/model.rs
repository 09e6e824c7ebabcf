// src/model.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Uniquely identifies a repository across the whole dataset (case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Production,
    Development,
    Direct,
    Indirect,
}

/// Where a dependency record was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOrigin {
    PackageManifest,
    DependencyGraph,
}

/// A single declared or resolved dependency. Identity is the (name, version) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    pub source: DependencyOrigin,
}

impl DependencyRecord {
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub sources_checked: BTreeSet<String>,
    pub total_dependencies: usize,
    pub error: Option<String>,
}

/// The outcome of analyzing one repository's dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// `owner/name`
    pub repository: String,
    pub dependencies: Vec<DependencyRecord>,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    pub fn empty(identity: &RepositoryIdentity) -> Self {
        Self {
            repository: identity.to_string(),
            dependencies: Vec::new(),
            metadata: AnalysisMetadata::default(),
        }
    }
}

/// Repository metadata merged from the GraphQL and REST endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRecord {
    pub description: Option<String>,
    pub primary_language: Option<String>,
    pub license_name: Option<String>,
    pub security_policy_enabled: Option<bool>,
    pub vulnerability_alerts_enabled: Option<bool>,
    pub stargazers_count: i64,
    pub network_count: Option<i64>,
    pub subscribers_count: Option<i64>,
    /// Language names as reported by the source
    pub languages: BTreeSet<String>,
}

/// A per-repository failure recorded during a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub owner: String,
    pub name: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn new(identity: &RepositoryIdentity, error: impl Into<String>) -> Self {
        Self {
            owner: identity.owner.clone(),
            name: identity.name.clone(),
            error: error.into(),
        }
    }
}
