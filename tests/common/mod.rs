use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use repo_enrich::github::{
    DependencySource, LanguageConnection, MetadataSource, NamedNode, RepoMetadata, RestCounts,
};
use repo_enrich::SourceError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct FakeRepo {
    pub languages: Vec<&'static str>,
    pub license: Option<&'static str>,
    pub manifest: Option<Value>,
    pub graph: Vec<(&'static str, &'static str)>,
}

/// In-memory stand-in for the hosting API. Unknown repositories fail.
#[derive(Clone, Default)]
pub struct FakeHost {
    repos: Arc<HashMap<String, FakeRepo>>,
    pub metadata_calls: Arc<AtomicUsize>,
}

impl FakeHost {
    pub fn new(repos: Vec<(&str, FakeRepo)>) -> Self {
        Self {
            repos: Arc::new(repos.into_iter().map(|(n, r)| (n.to_string(), r)).collect()),
            metadata_calls: Arc::default(),
        }
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn repo(&self, name: &str) -> Result<&FakeRepo, SourceError> {
        self.repos
            .get(name)
            .ok_or_else(|| SourceError::Decode(format!("{name} is unreachable")))
    }
}

impl MetadataSource for FakeHost {
    fn query_metadata(&self, _: &str, name: &str) -> Result<Option<RepoMetadata>, SourceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let repo = self.repo(name)?;
        Ok(Some(RepoMetadata {
            description: Some(format!("the {name} project")),
            primary_language: repo.languages.first().map(|l| NamedNode { name: l.to_string() }),
            license_info: repo.license.map(|l| NamedNode { name: l.to_string() }),
            languages: Some(LanguageConnection {
                nodes: repo.languages.iter().map(|l| NamedNode { name: l.to_string() }).collect(),
            }),
            ..Default::default()
        }))
    }

    fn query_rest_counts(&self, _: &str, _: &str) -> Result<RestCounts, SourceError> {
        Ok(RestCounts::default())
    }
}

impl DependencySource for FakeHost {
    fn fetch_manifest_file(&self, _: &str, name: &str, _: &str) -> Result<Option<String>, SourceError> {
        Ok(self
            .repo(name)?
            .manifest
            .as_ref()
            .map(|m| STANDARD.encode(m.to_string())))
    }

    fn fetch_dependency_graph(&self, _: &str, name: &str) -> Result<Vec<Value>, SourceError> {
        let deps: Vec<Value> = self
            .repo(name)?
            .graph
            .iter()
            .map(|(n, v)| json!({"package": {"name": n}, "metadata": {"version": v}, "direct": true}))
            .collect();
        Ok(vec![json!({"manifests": {"lockfile": {"resolved": {"dependencies": deps}}}})])
    }
}
