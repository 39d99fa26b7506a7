//! Core types and errors for the placeholder claimer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Errors that can occur while scanning and claiming packages.
#[derive(Error, Debug)]
pub enum DepclaimError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Repository discovery failed: {0}")]
    DiscoveryError(String),

    #[error("Failed to scrape {url}: {reason}")]
    ScrapeError { url: String, reason: String },

    #[error("No package found at {0}")]
    EmptyResultError(String),

    #[error("Failed to look up {name} on the public index: {reason}")]
    VerificationError { name: String, reason: String },

    #[error("Unable to build placeholder for {name}: {reason}")]
    PackagingError { name: String, reason: String },

    #[error("Invalid response from the public index received: {status}. Body: {body}")]
    PublishError { status: u16, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, DepclaimError>;

/// A private, local, package-typed repository on the internal registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Browse URL of the repository as reported by the registry.
    pub url: Url,
    /// Repository key, when the catalog provides one.
    pub key: Option<String>,
}

impl RepositoryRef {
    pub fn new(url: Url) -> Self {
        Self { url, key: None }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A package name scraped from a repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Trim and validate a candidate name.
    ///
    /// Empty candidates are rejected, as are candidates with inner
    /// whitespace or control characters, which no distribution name holds.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of looking a name up on the public index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipVerdict {
    /// Published, and the maintainer contact is ours.
    OwnedByUs,
    /// Published by someone else.
    OwnedByOther { author_email: String },
    /// No such project on the public index.
    NotFound,
}

/// An in-memory source distribution reserving a package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderArtifact {
    pub name: PackageName,
    pub version: String,
    /// sdist file name, `<name>-<version>.tar.gz`.
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Hex MD5 of `bytes`, required by the legacy upload API.
    pub md5_digest: String,
    /// Hex SHA-256 of `bytes`.
    pub sha256_digest: String,
}

/// Terminal outcome for one package name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_ours: bool,
    pub created: bool,
}

impl PackageResult {
    pub fn new(name: &PackageName) -> Self {
        Self {
            name: name.to_string(),
            error: None,
            is_ours: false,
            created: false,
        }
    }

    /// Whether this name is held by the organization after the run.
    pub fn is_placeholder(&self) -> bool {
        self.is_ours || self.created
    }

    /// Looked up successfully but published by someone else.
    pub fn is_ignored(&self) -> bool {
        self.error.is_none() && !self.is_ours && !self.created
    }
}

/// Terminal outcome for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryResult {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub packages: Vec<PackageResult>,
}

impl RepositoryResult {
    /// A repository whose listing could not be scraped.
    pub fn failed(repo: &RepositoryRef, error: String) -> Self {
        Self {
            url: repo.to_string(),
            error: Some(error),
            packages: Vec::new(),
        }
    }
}

/// Result of one full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_packages: usize,
    pub placeholders: usize,
    pub ignored_packages: usize,
    pub repositories: Vec<RepositoryResult>,
}

impl ScanSummary {
    /// Fold repository results into a summary. Order of `results` is irrelevant.
    pub fn from_results(results: Vec<RepositoryResult>) -> Self {
        let mut summary = ScanSummary::default();
        let mut failed = 0;

        for repo in &results {
            if repo.error.is_some() {
                failed += 1;
            }
            summary.total_packages += repo.packages.len();
            summary.placeholders += repo.packages.iter().filter(|p| p.is_placeholder()).count();
            summary.ignored_packages += repo.packages.iter().filter(|p| p.is_ignored()).count();
        }

        if failed > 0 {
            summary.error = Some(format!(
                "{} of {} repositories failed",
                failed,
                results.len()
            ));
        }

        summary.repositories = results;
        summary
    }
}
