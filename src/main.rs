//! depclaim - dependency confusion guard.
//!
//! CLI entry point.

use clap::Parser;
use depclaim::notify::ConsoleOutput;
use depclaim::{Commands, Config, PackConfig, PackageName, PlaceholderBuilder, ScanConfig, Scanner};
use std::fs;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // stdout carries the JSON summary, so logs go to stderr
    let filter = if config.verbose {
        EnvFilter::new("depclaim=debug,info")
    } else {
        EnvFilter::new("depclaim=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match config.command.clone() {
        Commands::Scan(scan_config) => run_scan(scan_config, &config).await,
        Commands::Pack(pack_config) => run_pack(pack_config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

async fn run_scan(scan_config: ScanConfig, global_config: &Config) -> Result<(), ExitCode> {
    let settings = match scan_config.settings() {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let scanner = match Scanner::new(&settings) {
        Ok(s) => s.with_console(ConsoleOutput::new(global_config.verbose, scan_config.quiet)),
        Err(e) => {
            error!("Failed to create scanner: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let summary = match scanner.run().await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Scan aborted: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let json = if scan_config.pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    };
    let json = match json {
        Ok(json) => json,
        Err(e) => {
            error!("Unable to serialize scan summary: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if let Some(ref output_path) = scan_config.output {
        if let Err(e) = fs::write(output_path, format!("{}\n", json)) {
            error!("Failed to write output file: {}", e);
            return Err(ExitCode::FAILURE);
        }
        info!("Results written to: {:?}", output_path);
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn run_pack(pack_config: PackConfig) -> Result<(), ExitCode> {
    let Some(name) = PackageName::parse(&pack_config.name) else {
        error!("Invalid package name: {:?}", pack_config.name);
        return Err(ExitCode::FAILURE);
    };

    let builder = PlaceholderBuilder::new(
        pack_config.email.trim(),
        pack_config.placeholder_version.trim(),
    );

    let artifact = match builder.build(&name) {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("{}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    match artifact.write_to_dir(&pack_config.out_dir) {
        Ok(path) => {
            println!("{}", path.display());
            println!("md5:    {}", artifact.md5_digest);
            println!("sha256: {}", artifact.sha256_digest);
            Ok(())
        }
        Err(e) => {
            error!("Failed to write archive: {}", e);
            Err(ExitCode::FAILURE)
        }
    }
}
