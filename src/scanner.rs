//! Main scanner orchestrating discovery, verification and claiming.
//!
//! Repositories are scanned concurrently, and the names inside each
//! repository are verified concurrently, both under fixed ceilings. Every
//! dispatched repository produces exactly one [`RepositoryResult`] and every
//! dispatched name exactly one [`PackageResult`]; a failure is recorded on
//! its own result and never stops sibling work. Only repository discovery
//! can fail the run.

use crate::config::{ClaimPolicy, ScanOptions, ScanSettings};
use crate::notify::ConsoleOutput;
use crate::package::PlaceholderBuilder;
use crate::registry::{self, ArtifactoryClient, PrivateRegistry, PublicIndex, PypiClient};
use crate::types::{
    OwnershipVerdict, PackageName, PackageResult, RepositoryRef, RepositoryResult, Result,
    ScanSummary,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal state of one package name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PackageOutcome {
    /// Published on the public index under our contact.
    Owned,
    /// Published on the public index by someone else.
    Foreign,
    /// Placeholder uploaded.
    Claimed,
    /// Placeholder built but not uploaded (dry run).
    WouldClaim,
    /// Building or uploading the placeholder failed.
    ClaimFailed(String),
    /// The lookup failed and the policy does not claim on failure.
    VerifyFailed(String),
}

impl PackageOutcome {
    fn into_result(self, name: &PackageName) -> PackageResult {
        let mut result = PackageResult::new(name);
        match self {
            PackageOutcome::Owned => result.is_ours = true,
            PackageOutcome::Foreign => {}
            PackageOutcome::Claimed => {
                result.is_ours = true;
                result.created = true;
            }
            PackageOutcome::WouldClaim => {
                result.error = Some("dry run: not published".to_string());
            }
            PackageOutcome::ClaimFailed(error) => result.error = Some(error),
            PackageOutcome::VerifyFailed(error) => {
                result.error = Some(format!("failed to verify ownership: {}", error));
            }
        }
        result
    }
}

/// Main scanner that drives the scan-verify-publish pipeline.
pub struct Scanner {
    registry: Arc<dyn PrivateRegistry>,
    index: Arc<dyn PublicIndex>,
    builder: PlaceholderBuilder,
    options: ScanOptions,
    console: ConsoleOutput,
}

impl Scanner {
    /// Create a scanner talking to Artifactory and PyPI.
    pub fn new(settings: &ScanSettings) -> Result<Self> {
        let client = registry::http_client(settings.timeout_secs)?;

        let artifactory = ArtifactoryClient::new(
            client.clone(),
            settings.registry_url.clone(),
            settings.ecosystem.clone(),
        );
        let pypi = PypiClient::new(
            client,
            settings.index_url.clone(),
            settings.upload_url.clone(),
            settings.author_email.clone(),
            settings.token.clone(),
        );
        let builder = PlaceholderBuilder::new(
            settings.author_email.clone(),
            settings.placeholder_version.clone(),
        );

        Ok(Self::with_backends(
            Arc::new(artifactory),
            Arc::new(pypi),
            builder,
            settings.options.clone(),
        ))
    }

    /// Create a scanner over arbitrary backends. Console output is off.
    pub fn with_backends(
        registry: Arc<dyn PrivateRegistry>,
        index: Arc<dyn PublicIndex>,
        builder: PlaceholderBuilder,
        options: ScanOptions,
    ) -> Self {
        Self {
            registry,
            index,
            builder,
            options,
            console: ConsoleOutput::silent(),
        }
    }

    /// Replace the console output handler.
    pub fn with_console(mut self, console: ConsoleOutput) -> Self {
        self.console = console;
        self
    }

    /// Run one full scan.
    ///
    /// Fails only when the repository catalog cannot be listed.
    pub async fn run(&self) -> Result<ScanSummary> {
        let repositories = self.registry.list_repositories().await?;
        self.console
            .print_info(&format!("Scanning {} repositories", repositories.len()));

        let pb = self
            .console
            .create_progress_bar(repositories.len() as u64, "Scanning repositories");

        let results: Vec<RepositoryResult> = stream::iter(repositories.iter())
            .map(|repo| self.scan_repository(repo))
            .buffer_unordered(self.options.repository_concurrency.max(1))
            .inspect(|_| {
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            })
            .collect()
            .await;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        debug_assert_eq!(results.len(), repositories.len());

        let summary = ScanSummary::from_results(results);
        info!(
            "Scanned {} packages, {} placeholders held",
            summary.total_packages, summary.placeholders
        );
        self.console.print_summary(&summary);

        Ok(summary)
    }

    /// Scrape one repository and process every name in it.
    async fn scan_repository(&self, repo: &RepositoryRef) -> RepositoryResult {
        let names = match self.registry.list_package_names(repo).await {
            Ok(names) => names,
            Err(e) => {
                warn!("Error handling {}: {}", repo, e);
                let result =
                    RepositoryResult::failed(repo, format!("failed to get package names: {}", e));
                self.console.print_repository_failure(&result);
                return result;
            }
        };

        debug!(
            "Processing {} packages from {}",
            names.len(),
            repo.key.as_deref().unwrap_or(repo.url.as_str())
        );

        let packages: Vec<PackageResult> = stream::iter(names.iter())
            .map(|name| self.handle_package(name))
            .buffer_unordered(self.options.package_concurrency.max(1))
            .collect()
            .await;

        debug_assert_eq!(packages.len(), names.len());

        RepositoryResult {
            url: repo.to_string(),
            error: None,
            packages,
        }
    }

    async fn handle_package(&self, name: &PackageName) -> PackageResult {
        let result = self.resolve(name).await.into_result(name);

        if let Some(ref error) = result.error {
            warn!("Error handling {}: {}", name, error);
        }
        self.console.print_package(&result);

        result
    }

    /// Verify ownership and claim the name when it is free.
    async fn resolve(&self, name: &PackageName) -> PackageOutcome {
        match self.index.verify_ownership(name).await {
            Ok(OwnershipVerdict::OwnedByUs) => {
                debug!("{} is already ours", name);
                PackageOutcome::Owned
            }
            Ok(OwnershipVerdict::OwnedByOther { author_email }) => {
                warn!(
                    "{} is published on the public index by '{}'",
                    name, author_email
                );
                PackageOutcome::Foreign
            }
            Ok(OwnershipVerdict::NotFound) => {
                info!("{} is not on the public index, claiming it", name);
                self.claim(name).await
            }
            Err(e) => match self.options.claim_policy {
                ClaimPolicy::OnLookupFailure => {
                    warn!("Received error from PyPI: {}. Trying to create {} package.", e, name);
                    self.claim(name).await
                }
                ClaimPolicy::NotFoundOnly => PackageOutcome::VerifyFailed(e.to_string()),
            },
        }
    }

    /// Build and upload a placeholder. Exactly one attempt.
    async fn claim(&self, name: &PackageName) -> PackageOutcome {
        let artifact = match self.builder.build(name) {
            Ok(artifact) => artifact,
            Err(e) => {
                return PackageOutcome::ClaimFailed(format!(
                    "unable to create package '{}': {}",
                    name, e
                ))
            }
        };

        if self.options.dry_run {
            info!(
                "Dry run: would publish {} (md5 {})",
                artifact.filename, artifact.md5_digest
            );
            return PackageOutcome::WouldClaim;
        }

        match self.index.publish(&artifact).await {
            Ok(()) => PackageOutcome::Claimed,
            Err(e) => PackageOutcome::ClaimFailed(format!(
                "unable to create package '{}': {}",
                name, e
            )),
        }
    }
}
