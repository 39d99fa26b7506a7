//! Upstream registries.
//!
//! The private registry (Artifactory) is the source of package names; the
//! public index (PyPI) is checked for ownership and receives placeholders.
//! Both sit behind traits so the scanner can be driven by other backends.

pub mod artifactory;
pub mod pypi;

use crate::types::{OwnershipVerdict, PackageName, PlaceholderArtifact, RepositoryRef, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub use artifactory::ArtifactoryClient;
pub use pypi::PypiClient;

/// Source of internal package names.
#[async_trait]
pub trait PrivateRegistry: Send + Sync {
    /// Every local repository of the target ecosystem.
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>>;

    /// Package names listed in one repository.
    async fn list_package_names(&self, repo: &RepositoryRef) -> Result<Vec<PackageName>>;
}

/// Public index where names are checked and claimed.
#[async_trait]
pub trait PublicIndex: Send + Sync {
    /// Look `name` up and compare its maintainer contact with ours.
    async fn verify_ownership(&self, name: &PackageName) -> Result<OwnershipVerdict>;

    /// Upload a placeholder distribution.
    async fn publish(&self, artifact: &PlaceholderArtifact) -> Result<()>;
}

/// Shared HTTP client with the process-wide request timeout.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("depclaim/", env!("CARGO_PKG_VERSION")))
        .http1_only()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()?;
    Ok(client)
}
