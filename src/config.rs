//! Configuration handling for the claimer.

use crate::package::DEFAULT_PLACEHOLDER_VERSION;
use crate::types::{DepclaimError, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Claims internal package names on the public index before someone else does.
#[derive(Parser, Debug, Clone)]
#[command(name = "depclaim")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan private repositories and publish placeholders for unclaimed names
    Scan(ScanConfig),
    /// Build a placeholder archive locally without uploading it
    Pack(PackConfig),
}

/// What to do when the ownership lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimPolicy {
    /// Claim only names the public index reports as missing.
    #[default]
    NotFoundOnly,
    /// Also claim when the lookup fails (transport, status, decoding).
    OnLookupFailure,
}

/// Knobs for the scan pipeline itself.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub repository_concurrency: usize,
    pub package_concurrency: usize,
    pub claim_policy: ClaimPolicy,
    pub dry_run: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            repository_concurrency: 4,
            package_concurrency: 16,
            claim_policy: ClaimPolicy::NotFoundOnly,
            dry_run: false,
        }
    }
}

/// Configuration for the scan command.
#[derive(Parser, Debug, Clone)]
pub struct ScanConfig {
    /// Artifactory base URL (the API lives under `<url>/api`)
    #[arg(long, env = "ARTIFACTORY_URL")]
    pub registry_url: String,

    /// Public index base URL used for ownership lookups
    #[arg(long, env = "PYPI_URL", default_value = "https://pypi.org")]
    pub pypi_url: String,

    /// Public index upload base URL
    #[arg(long, env = "PYPI_UPLOAD_URL", default_value = "https://upload.pypi.org")]
    pub upload_url: String,

    /// Contact identity the organization publishes under
    #[arg(long, env = "PYPI_EMAIL")]
    pub email: String,

    /// Upload API token
    #[arg(long, env = "PYPI_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Registry package type to scan
    #[arg(long, default_value = "pypi")]
    pub ecosystem: String,

    /// Version published for placeholders
    #[arg(long, default_value = DEFAULT_PLACEHOLDER_VERSION)]
    pub placeholder_version: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Repositories scanned in parallel
    #[arg(long, default_value = "4")]
    pub repository_concurrency: usize,

    /// Packages checked in parallel within one repository
    #[arg(long, default_value = "16")]
    pub package_concurrency: usize,

    /// Treat a failed ownership lookup as "not published" and claim the name
    #[arg(long)]
    pub claim_on_lookup_error: bool,

    /// Verify and build placeholders but do not upload them
    #[arg(long)]
    pub dry_run: bool,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pub pretty: bool,

    /// Suppress per-package progress lines on stderr
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Configuration for the pack command.
#[derive(Parser, Debug, Clone)]
pub struct PackConfig {
    /// Package name to build a placeholder for
    pub name: String,

    /// Contact identity stamped into the metadata
    #[arg(long, env = "PYPI_EMAIL")]
    pub email: String,

    /// Version of the placeholder
    #[arg(long, default_value = DEFAULT_PLACEHOLDER_VERSION)]
    pub placeholder_version: String,

    /// Directory to write the archive into
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Validated scan configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub registry_url: Url,
    pub index_url: Url,
    pub upload_url: Url,
    pub author_email: String,
    pub token: String,
    pub ecosystem: String,
    pub placeholder_version: String,
    pub timeout_secs: u64,
    pub options: ScanOptions,
}

impl ScanConfig {
    /// Validate the raw arguments.
    pub fn settings(&self) -> Result<ScanSettings> {
        let author_email = require_non_empty("email", &self.email)?;
        let token = match self.token.as_deref() {
            Some(token) if !self.dry_run => require_non_empty("token", token)?,
            Some(token) => token.trim().to_string(),
            None if self.dry_run => String::new(),
            None => {
                return Err(DepclaimError::ConfigError(
                    "token is required unless --dry-run is set".to_string(),
                ))
            }
        };

        if self.repository_concurrency == 0 || self.package_concurrency == 0 {
            return Err(DepclaimError::ConfigError(
                "concurrency limits must be at least 1".to_string(),
            ));
        }

        Ok(ScanSettings {
            registry_url: parse_base_url("registry-url", &self.registry_url)?,
            index_url: parse_base_url("pypi-url", &self.pypi_url)?,
            upload_url: parse_base_url("upload-url", &self.upload_url)?,
            author_email,
            token,
            ecosystem: require_non_empty("ecosystem", &self.ecosystem)?,
            placeholder_version: require_non_empty("placeholder-version", &self.placeholder_version)?,
            timeout_secs: self.timeout,
            options: ScanOptions {
                repository_concurrency: self.repository_concurrency,
                package_concurrency: self.package_concurrency,
                claim_policy: if self.claim_on_lookup_error {
                    ClaimPolicy::OnLookupFailure
                } else {
                    ClaimPolicy::NotFoundOnly
                },
                dry_run: self.dry_run,
            },
        })
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DepclaimError::ConfigError(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn parse_base_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())
        .map_err(|e| DepclaimError::ConfigError(format!("invalid {} {:?}: {}", field, value, e)))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(DepclaimError::ConfigError(format!(
            "{} must be an http(s) URL, got {:?}",
            field, value
        )));
    }

    Ok(url)
}
