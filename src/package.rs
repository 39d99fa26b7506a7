//! Placeholder source distributions.
//!
//! A placeholder is a minimal sdist holding a `PKG-INFO` and a `setup.py`
//! that declare the organization as author. Archives are byte-for-byte
//! reproducible for a given name, version and contact, since the upload
//! transmits a digest of the exact payload.

use crate::types::{DepclaimError, PackageName, PlaceholderArtifact, Result};
use flate2::{write::GzEncoder, Compression, GzBuilder};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Header;

/// Version published for every placeholder unless overridden.
pub const DEFAULT_PLACEHOLDER_VERSION: &str = "0.0.0";

/// Builds placeholder sdists stamped with the organization's contact.
#[derive(Debug, Clone)]
pub struct PlaceholderBuilder {
    author_email: String,
    version: String,
}

impl PlaceholderBuilder {
    pub fn new(author_email: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            author_email: author_email.into(),
            version: version.into(),
        }
    }

    /// Build the `.tar.gz` placeholder for `name`.
    pub fn build(&self, name: &PackageName) -> Result<PlaceholderArtifact> {
        let bytes = self.archive(name).map_err(|e| DepclaimError::PackagingError {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(PlaceholderArtifact {
            name: name.clone(),
            version: self.version.clone(),
            filename: format!("{}-{}.tar.gz", name, self.version),
            md5_digest: hex::encode(Md5::digest(&bytes)),
            sha256_digest: hex::encode(Sha256::digest(&bytes)),
            bytes,
        })
    }

    /// Files in archive order, paths relative to the archive root.
    pub fn files(&self, name: &PackageName) -> Vec<(String, String)> {
        let root = format!("{}-{}", name, self.version);
        vec![
            (format!("{}/PKG-INFO", root), self.pkg_info(name)),
            (format!("{}/setup.py", root), self.setup_py(name)),
        ]
    }

    fn archive(&self, name: &PackageName) -> std::io::Result<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());

        for (path, content) in self.files(name) {
            let mut header = Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);
            header.set_mode(0o644);
            header.set_size(content.len() as u64);
            builder.append_data(&mut header, &path, content.as_bytes())?;
        }

        let tar_bytes = builder.into_inner()?;
        // GzBuilder leaves the header mtime at zero
        let mut encoder: GzEncoder<Vec<u8>> =
            GzBuilder::new().write(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes)?;
        encoder.finish()
    }

    fn pkg_info(&self, name: &PackageName) -> String {
        format!(
            "Metadata-Version: 1.0\n\
             Name: {name}\n\
             Version: {version}\n\
             Summary: Placeholder reserving this name against dependency confusion\n\
             Home-page: UNKNOWN\n\
             Author: UNKNOWN\n\
             Author-email: {email}\n\
             License: UNKNOWN\n\
             Description: This package is intentionally empty. The name is held by {email}.\n\
             Platform: UNKNOWN\n",
            name = name,
            version = self.version,
            email = self.author_email,
        )
    }

    fn setup_py(&self, name: &PackageName) -> String {
        format!(
            "from setuptools import setup\n\
             \n\
             setup(name={name}, version={version}, author_email={email})\n",
            name = python_str(name.as_str()),
            version = python_str(&self.version),
            email = python_str(&self.author_email),
        )
    }
}

/// Double-quoted Python string literal for `value`.
fn python_str(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for c in value.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c if c.is_control() => literal.push_str(&format!("\\x{:02x}", c as u32)),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

impl PlaceholderArtifact {
    /// Write the archive into `dir` under its sdist file name.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}
