//! Artifactory client: repository discovery and simple-index scraping.

use crate::parser::SimpleIndexParser;
use crate::registry::PrivateRegistry;
use crate::types::{DepclaimError, PackageName, RepositoryRef, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

/// Entry of the `api/repositories` catalog.
#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    url: String,
    #[serde(default)]
    key: Option<String>,
}

/// `{base}/api/repositories?type=local&packageType={ecosystem}`
pub fn repositories_url(base: &Url, ecosystem: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| DepclaimError::ConfigError(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(["api", "repositories"]);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("type", "local")
        .append_pair("packageType", ecosystem);
    Ok(url)
}

/// `{repository}/.{ecosystem}/simple.html`
pub fn simple_index_url(repository: &Url, ecosystem: &str) -> Result<Url> {
    let mut url = repository.clone();
    url.path_segments_mut()
        .map_err(|_| DepclaimError::ScrapeError {
            url: repository.to_string(),
            reason: "repository URL cannot be a base".to_string(),
        })?
        .pop_if_empty()
        .push(&format!(".{}", ecosystem))
        .push("simple.html");
    url.set_query(None);
    Ok(url)
}

/// Client for the private Artifactory instance.
pub struct ArtifactoryClient {
    client: Client,
    base_url: Url,
    ecosystem: String,
    parser: SimpleIndexParser,
}

impl ArtifactoryClient {
    pub fn new(client: Client, base_url: Url, ecosystem: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            ecosystem: ecosystem.into(),
            parser: SimpleIndexParser::new(),
        }
    }

    async fn fetch_listing(&self, url: &Url) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("failed to send request: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        response
            .text()
            .await
            .map_err(|e| format!("failed to read body: {}", e))
    }
}

#[async_trait]
impl PrivateRegistry for ArtifactoryClient {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>> {
        let url = repositories_url(&self.base_url, &self.ecosystem)?;
        debug!("Listing repositories: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DepclaimError::DiscoveryError(format!("failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DepclaimError::DiscoveryError(format!(
                "repository catalog returned HTTP {}",
                status
            )));
        }

        let entries: Vec<RepositoryEntry> = response
            .json()
            .await
            .map_err(|e| DepclaimError::DiscoveryError(format!("failed to decode response: {}", e)))?;

        let mut repositories = Vec::with_capacity(entries.len());
        for entry in entries {
            match Url::parse(&entry.url) {
                Ok(url) => repositories.push(RepositoryRef {
                    url,
                    key: entry.key,
                }),
                Err(e) => warn!("Skipping repository with invalid URL {:?}: {}", entry.url, e),
            }
        }

        info!("Got {} {} repositories from Artifactory", repositories.len(), self.ecosystem);
        Ok(repositories)
    }

    async fn list_package_names(&self, repo: &RepositoryRef) -> Result<Vec<PackageName>> {
        let url = simple_index_url(&repo.url, &self.ecosystem)?;
        info!("Scanning: {}", url);

        let markup = self
            .fetch_listing(&url)
            .await
            .map_err(|reason| DepclaimError::ScrapeError {
                url: url.to_string(),
                reason,
            })?;

        let names = self.parser.package_names(&markup);
        if names.is_empty() {
            return Err(DepclaimError::EmptyResultError(url.to_string()));
        }

        debug!("Found {} packages in {}", names.len(), repo);
        Ok(names)
    }
}
