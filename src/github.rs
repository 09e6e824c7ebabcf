// src/github.rs

use crate::error::SourceError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const METADATA_QUERY: &str = r#"
query($owner: String!, $repo: String!) {
  repository(owner: $owner, name: $repo) {
    description
    primaryLanguage { name }
    licenseInfo { name }
    languages(first: 100, orderBy: {field: SIZE, direction: DESC}) {
      nodes { name }
    }
    stargazers { totalCount }
    isSecurityPolicyEnabled
    hasVulnerabilityAlertsEnabled
  }
}
"#;

/// Repository metadata as returned by the GraphQL endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    pub description: Option<String>,
    pub primary_language: Option<NamedNode>,
    pub license_info: Option<NamedNode>,
    #[serde(default)]
    pub languages: Option<LanguageConnection>,
    pub stargazers: Option<CountNode>,
    pub is_security_policy_enabled: Option<bool>,
    pub has_vulnerability_alerts_enabled: Option<bool>,
}

impl RepoMetadata {
    pub fn language_names(&self) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .flat_map(|l| l.nodes.iter())
            .map(|n| n.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NamedNode {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LanguageConnection {
    #[serde(default)]
    pub nodes: Vec<NamedNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountNode {
    pub total_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RestCounts {
    pub network_count: Option<i64>,
    pub subscribers_count: Option<i64>,
}

/// Repository metadata queries. `Ok(None)` means the repository is unknown to the source.
pub trait MetadataSource: Send + Sync {
    fn query_metadata(&self, owner: &str, name: &str) -> Result<Option<RepoMetadata>, SourceError>;
    fn query_rest_counts(&self, owner: &str, name: &str) -> Result<RestCounts, SourceError>;
}

/// Dependency queries. `fetch_manifest_file` returns the file's base64 payload.
pub trait DependencySource: Send + Sync {
    fn fetch_manifest_file(&self, owner: &str, name: &str, path: &str) -> Result<Option<String>, SourceError>;
    fn fetch_dependency_graph(&self, owner: &str, name: &str) -> Result<Vec<Value>, SourceError>;
}

/// Blocking GitHub REST + GraphQL client with a bounded retry budget
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
    max_retries: u32,
    retry_pause: Duration,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("repo-enrich/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: DEFAULT_API_URL.to_string(),
            token,
            max_retries: 3,
            retry_pause: Duration::from_millis(500),
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_pause: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_pause = retry_pause;
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github.v3+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET a REST path. 204 and 404 are `Ok(None)` and are not retried.
    pub fn get_json(&self, path: &str) -> Result<Option<Value>, SourceError> {
        let url = format!("{}{}", self.api_url, path);
        self.with_retry(&url, || self.authorize(self.http.get(&url)))
    }

    fn post_graphql(&self, body: &Value) -> Result<Option<Value>, SourceError> {
        let url = format!("{}/graphql", self.api_url);
        self.with_retry(&url, || self.authorize(self.http.post(&url)).json(body))
    }

    fn with_retry<F>(&self, url: &str, build: F) -> Result<Option<Value>, SourceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last = String::new();
        for attempt in 1..=self.max_retries {
            tracing::debug!(url, attempt, "request");
            match build().send() {
                Ok(resp) => match resp.status() {
                    StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => return Ok(None),
                    s if s.is_success() => return Ok(Some(resp.json()?)),
                    s => {
                        last = SourceError::Status {
                            url: url.to_string(),
                            status: s.as_u16(),
                        }
                        .to_string();
                    }
                },
                Err(e) => last = e.to_string(),
            }
            tracing::warn!(url, attempt, max = self.max_retries, error = %last, "request failed");
            if attempt < self.max_retries {
                thread::sleep(self.retry_pause);
            }
        }
        Err(SourceError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last,
        })
    }
}

impl MetadataSource for GitHubClient {
    fn query_metadata(&self, owner: &str, name: &str) -> Result<Option<RepoMetadata>, SourceError> {
        let body = json!({
            "query": METADATA_QUERY,
            "variables": { "owner": owner, "repo": name },
        });
        let Some(resp) = self.post_graphql(&body)? else {
            return Ok(None);
        };
        if let Some(errors) = resp.get("errors") {
            tracing::warn!(%owner, %name, %errors, "GraphQL returned errors");
            return Ok(None);
        }
        match resp.pointer("/data/repository") {
            None | Some(Value::Null) => Ok(None),
            Some(repo) => Ok(Some(RepoMetadata::deserialize(repo)?)),
        }
    }

    fn query_rest_counts(&self, owner: &str, name: &str) -> Result<RestCounts, SourceError> {
        match self.get_json(&format!("/repos/{owner}/{name}"))? {
            Some(repo) => Ok(RestCounts::deserialize(&repo)?),
            None => Ok(RestCounts::default()),
        }
    }
}

impl DependencySource for GitHubClient {
    fn fetch_manifest_file(&self, owner: &str, name: &str, path: &str) -> Result<Option<String>, SourceError> {
        let content = self.get_json(&format!("/repos/{owner}/{name}/contents/{path}"))?;
        Ok(content
            .as_ref()
            .and_then(|c| c.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn fetch_dependency_graph(&self, owner: &str, name: &str) -> Result<Vec<Value>, SourceError> {
        match self.get_json(&format!("/repos/{owner}/{name}/dependency-graph/snapshots"))? {
            Some(Value::Array(snapshots)) => Ok(snapshots),
            Some(other) => Err(SourceError::Decode(format!(
                "expected a list of snapshots, got {}",
                kind_of(&other)
            ))),
            None => Ok(Vec::new()),
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
