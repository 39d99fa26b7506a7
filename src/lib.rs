//! depclaim - dependency confusion guard for private Python packages.
//!
//! This library protects internally published package names by:
//! - Listing every local PyPI repository on the private Artifactory
//! - Scraping each repository's simple index for package names
//! - Checking who owns each name on the public index
//! - Publishing an inert placeholder sdist for names nobody holds yet
//!
//! # Example
//!
//! ```no_run
//! use depclaim::{Config, Commands, Scanner};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::parse();
//!     if let Commands::Scan(scan) = config.command {
//!         let scanner = Scanner::new(&scan.settings().unwrap()).unwrap();
//!         let summary = scanner.run().await.unwrap();
//!         println!("{} placeholders held", summary.placeholders);
//!     }
//! }
//! ```

pub mod config;
pub mod notify;
pub mod package;
pub mod parser;
pub mod registry;
pub mod scanner;
pub mod types;

pub use config::{ClaimPolicy, Commands, Config, PackConfig, ScanConfig, ScanOptions, ScanSettings};
pub use package::PlaceholderBuilder;
pub use registry::{PrivateRegistry, PublicIndex};
pub use scanner::Scanner;
pub use types::{
    DepclaimError, OwnershipVerdict, PackageName, PackageResult, PlaceholderArtifact,
    RepositoryRef, RepositoryResult, Result, ScanSummary,
};
