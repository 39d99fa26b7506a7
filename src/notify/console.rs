//! Colored progress output on stderr.
//!
//! stdout is reserved for the JSON summary, so every human-readable line
//! goes to stderr.

use crate::types::{PackageResult, RepositoryResult, ScanSummary};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Console output handler with colors and formatting.
#[derive(Debug, Clone)]
pub struct ConsoleOutput {
    verbose: bool,
    quiet: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Output handler that prints nothing.
    pub fn silent() -> Self {
        Self::new(false, true)
    }

    /// Print info message.
    pub fn print_info(&self, message: &str) {
        if self.quiet {
            return;
        }

        eprintln!("{} {}", "[*]".bright_blue(), message);
    }

    /// Print the outcome for one package.
    pub fn print_package(&self, result: &PackageResult) {
        if self.quiet {
            return;
        }

        let status = package_status(result);
        match result.error {
            Some(ref error) => eprintln!(
                "{} {} {} {}",
                "[!]".yellow(),
                result.name.bright_white(),
                status,
                error.dimmed()
            ),
            None if result.created => {
                eprintln!("{} {} {}", "[+]".green(), result.name.bright_white().bold(), status)
            }
            None if self.verbose || !result.is_ours => {
                eprintln!("{} {} {}", "[.]".dimmed(), result.name, status)
            }
            None => {}
        }
    }

    /// Print a repository whose listing could not be scraped.
    pub fn print_repository_failure(&self, result: &RepositoryResult) {
        if self.quiet {
            return;
        }

        eprintln!(
            "{} {} {}",
            "[!]".red(),
            result.url.bright_white(),
            result.error.as_deref().unwrap_or_default().red()
        );
    }

    /// Print run summary.
    pub fn print_summary(&self, summary: &ScanSummary) {
        if self.quiet {
            return;
        }

        let failed_packages = summary
            .repositories
            .iter()
            .flat_map(|r| r.packages.iter())
            .filter(|p| p.error.is_some())
            .count();
        let created = summary
            .repositories
            .iter()
            .flat_map(|r| r.packages.iter())
            .filter(|p| p.created)
            .count();

        eprintln!();
        eprintln!("{}", "=== Scan Summary ===".bright_cyan());
        eprintln!("  Repositories:  {}", summary.repositories.len());
        eprintln!("  Packages:      {}", summary.total_packages);
        eprintln!("  Placeholders:  {}", summary.placeholders);
        eprintln!("  Created:       {}", created);

        if summary.ignored_packages > 0 {
            eprintln!(
                "  {}",
                format!(
                    "HELD BY SOMEONE ELSE ON THE PUBLIC INDEX: {}",
                    summary.ignored_packages
                )
                .red()
                .bold()
            );
        }

        if failed_packages > 0 {
            eprintln!("  {}", format!("Package errors: {}", failed_packages).yellow());
        }

        if let Some(ref error) = summary.error {
            eprintln!("  {}", error.yellow());
        }

        eprintln!();
    }

    /// Create a progress bar.
    pub fn create_progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }

        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(message.to_string());
        Some(pb)
    }
}

/// Short colored status for a package result.
fn package_status(result: &PackageResult) -> colored::ColoredString {
    match (result.created, result.is_ours, result.error.is_some()) {
        (true, _, _) => "placeholder published".green(),
        (false, true, _) => "owned".green(),
        (false, false, true) => "failed".yellow(),
        (false, false, false) => "held by someone else".red().bold(),
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false)
    }
}
