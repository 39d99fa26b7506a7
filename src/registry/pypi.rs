//! PyPI client: ownership lookups and legacy placeholder uploads.

use crate::registry::PublicIndex;
use crate::types::{DepclaimError, OwnershipVerdict, PackageName, PlaceholderArtifact, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

/// Username the upload API expects when authenticating with an API token.
pub const TOKEN_USERNAME: &str = "__token__";

/// Body returned when an error response cannot be read.
const UNREADABLE_BODY: &str = "[none]";

/// JSON API response, trimmed to the fields we compare.
#[derive(Debug, Deserialize)]
struct PackageInfo {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    author_email: Option<String>,
}

/// `{index}/pypi/{name}/json`
pub fn package_info_url(index: &Url, name: &PackageName) -> Result<Url> {
    let mut url = index.clone();
    url.path_segments_mut()
        .map_err(|_| DepclaimError::ConfigError(format!("{} cannot be a base URL", index)))?
        .pop_if_empty()
        .extend(["pypi", name.as_str(), "json"]);
    Ok(url)
}

/// `{upload}/legacy/`
pub fn upload_url(upload: &Url) -> Result<Url> {
    let mut url = upload.clone();
    url.path_segments_mut()
        .map_err(|_| DepclaimError::ConfigError(format!("{} cannot be a base URL", upload)))?
        .pop_if_empty()
        .extend(["legacy", ""]);
    Ok(url)
}

/// Compare a published author contact with ours, ignoring case.
pub fn verdict_for(author_email: Option<&str>, our_email: &str) -> OwnershipVerdict {
    let published = author_email.unwrap_or_default().trim();
    if !published.is_empty() && published.eq_ignore_ascii_case(our_email.trim()) {
        OwnershipVerdict::OwnedByUs
    } else {
        OwnershipVerdict::OwnedByOther {
            author_email: published.to_string(),
        }
    }
}

/// Text fields of a legacy `file_upload` request.
pub fn upload_fields(artifact: &PlaceholderArtifact, author_email: &str) -> Vec<(&'static str, String)> {
    vec![
        (":action", "file_upload".to_string()),
        ("protocol_version", "1".to_string()),
        ("filetype", "sdist".to_string()),
        ("pyversion", "source".to_string()),
        ("name", artifact.name.to_string()),
        ("metadata_version", "1.0".to_string()),
        ("author_email", author_email.to_string()),
        ("version", artifact.version.clone()),
        ("md5_digest", artifact.md5_digest.clone()),
        ("sha256_digest", artifact.sha256_digest.clone()),
    ]
}

/// Client for the public index.
pub struct PypiClient {
    client: Client,
    index_url: Url,
    upload_url: Url,
    author_email: String,
    token: String,
}

impl PypiClient {
    pub fn new(
        client: Client,
        index_url: Url,
        upload_url: Url,
        author_email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            index_url,
            upload_url,
            author_email: author_email.into(),
            token: token.into(),
        }
    }

    fn verification_error(name: &PackageName, reason: impl Into<String>) -> DepclaimError {
        DepclaimError::VerificationError {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PublicIndex for PypiClient {
    async fn verify_ownership(&self, name: &PackageName) -> Result<OwnershipVerdict> {
        let url = package_info_url(&self.index_url, name)?;
        debug!("Checking PyPI: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::verification_error(name, e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                debug!("Package NOT FOUND on PyPI: {}", name);
                return Ok(OwnershipVerdict::NotFound);
            }
            status => return Err(Self::verification_error(name, format!("HTTP {}", status))),
        }

        let info: PackageInfo = response
            .json()
            .await
            .map_err(|e| Self::verification_error(name, format!("failed to decode response: {}", e)))?;

        info!(
            "{} has '{}' as author",
            name,
            info.info.author_email.as_deref().unwrap_or_default()
        );
        Ok(verdict_for(info.info.author_email.as_deref(), &self.author_email))
    }

    async fn publish(&self, artifact: &PlaceholderArtifact) -> Result<()> {
        let content = Part::bytes(artifact.bytes.clone())
            .file_name(artifact.filename.clone())
            .mime_str("application/gzip")?;

        let form = upload_fields(artifact, &self.author_email)
            .into_iter()
            .fold(Form::new(), |form, (field, value)| form.text(field, value))
            .part("content", content);

        let url = upload_url(&self.upload_url)?;
        debug!("Uploading {} to {}", artifact.filename, url);

        let response = self
            .client
            .post(url)
            .basic_auth(TOKEN_USERNAME, Some(&self.token))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| UNREADABLE_BODY.to_string());
            return Err(DepclaimError::PublishError {
                status: status.as_u16(),
                body,
            });
        }

        info!("Published placeholder {}", artifact.filename);
        Ok(())
    }
}
