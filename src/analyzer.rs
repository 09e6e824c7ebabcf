// src/analyzer.rs

use crate::error::SourceError;
use crate::github::DependencySource;
use crate::model::*;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

pub const MANIFEST_PATH: &str = "package.json";
pub const MANIFEST_SOURCE: &str = "package.json";
pub const GRAPH_SOURCE: &str = "dependency_graph";

const MANIFEST_SECTIONS: [(&str, DependencyType); 2] = [
    ("dependencies", DependencyType::Production),
    ("devDependencies", DependencyType::Development),
];

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    manifests: BTreeMap<String, GraphManifest>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphManifest {
    #[serde(default)]
    resolved: Resolved,
}

#[derive(Debug, Default, Deserialize)]
struct Resolved {
    #[serde(default)]
    dependencies: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphDependency {
    package: Option<GraphPackage>,
    metadata: Option<GraphMetadata>,
    #[serde(default)]
    direct: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphPackage {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphMetadata {
    version: Option<Value>,
}

/// Resolves one repository's dependencies from its manifest and the dependency graph
pub struct DependencyAnalyzer<S> {
    source: S,
}

impl<S: DependencySource> DependencyAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Never fails: source errors land in `metadata.error` and whatever was
    /// collected from the other source is kept.
    pub fn analyze_repository(&self, repo: &RepositoryIdentity) -> AnalysisResult {
        let mut result = AnalysisResult::empty(repo);
        let failures = self.collect(repo, &mut result);
        result.dependencies = dedup_dependencies(std::mem::take(&mut result.dependencies));
        if failures.is_empty() {
            result.metadata.total_dependencies = result.dependencies.len();
        } else {
            let error = failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            tracing::warn!(%repo, %error, "dependency analysis failed");
            result.metadata.error = Some(error);
        }
        result
    }

    /// Queries both sources independently and returns the failures.
    fn collect(&self, repo: &RepositoryIdentity, result: &mut AnalysisResult) -> Vec<SourceError> {
        let mut failures = Vec::new();

        match self.source.fetch_manifest_file(&repo.owner, &repo.name, MANIFEST_PATH) {
            Ok(Some(encoded)) => match decode_manifest(&encoded) {
                Ok(manifest) => {
                    result.metadata.sources_checked.insert(MANIFEST_SOURCE.to_string());
                    result.dependencies.extend(extract_manifest_dependencies(&manifest));
                }
                Err(reason) => tracing::warn!(%repo, %reason, "skipping undecodable {}", MANIFEST_PATH),
            },
            Ok(None) => {}
            Err(e) => failures.push(e),
        }

        match self.source.fetch_dependency_graph(&repo.owner, &repo.name) {
            Ok(snapshots) => {
                result.metadata.sources_checked.insert(GRAPH_SOURCE.to_string());
                result.dependencies.extend(flatten_graph(repo, snapshots));
            }
            Err(e) => failures.push(e),
        }
        failures
    }
}

/// Base64 (line-wrapped) JSON object to its parsed value.
pub fn decode_manifest(encoded: &str) -> Result<Value, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    let text = String::from_utf8(bytes).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("manifest root is not an object".to_string());
    }
    Ok(value)
}

pub fn extract_manifest_dependencies(manifest: &Value) -> Vec<DependencyRecord> {
    let mut out = Vec::new();
    for (section, dep_type) in MANIFEST_SECTIONS {
        let Some(entries) = manifest.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (name, version) in entries {
            out.push(DependencyRecord {
                name: name.clone(),
                version: version.as_str().map_or_else(|| version.to_string(), str::to_string),
                dep_type,
                source: DependencyOrigin::PackageManifest,
            });
        }
    }
    out
}

/// Entries that do not have the expected shape are skipped, the rest are kept.
fn flatten_graph(repo: &RepositoryIdentity, snapshots: Vec<Value>) -> Vec<DependencyRecord> {
    let mut out = Vec::new();
    for raw in snapshots {
        let snapshot: Snapshot = match serde_json::from_value(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(%repo, error = %e, "skipping malformed graph snapshot");
                continue;
            }
        };
        for manifest in snapshot.manifests.into_values() {
            for entry in manifest.resolved.dependencies {
                let dep: GraphDependency = match serde_json::from_value(entry) {
                    Ok(dep) => dep,
                    Err(e) => {
                        tracing::warn!(%repo, error = %e, "skipping malformed graph entry");
                        continue;
                    }
                };
                out.push(DependencyRecord {
                    name: dep.package.and_then(|p| p.name).unwrap_or_else(|| "unknown".to_string()),
                    version: dep
                        .metadata
                        .and_then(|m| m.version)
                        .and_then(version_text)
                        .unwrap_or_else(|| "unknown".to_string()),
                    dep_type: if dep.direct.unwrap_or(false) {
                        DependencyType::Direct
                    } else {
                        DependencyType::Indirect
                    },
                    source: DependencyOrigin::DependencyGraph,
                });
            }
        }
    }
    out
}

fn version_text(version: Value) -> Option<String> {
    match version {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Keeps the first record for each (name, version) pair.
pub fn dedup_dependencies(deps: Vec<DependencyRecord>) -> Vec<DependencyRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::with_capacity(deps.len());
    for dep in deps {
        let key = (dep.name.clone(), dep.version.clone());
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        out.push(dep);
    }
    out
}
