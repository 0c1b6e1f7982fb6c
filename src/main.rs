//! mediapub - media package publication pipeline
//!
//! Entry point of the command line tool: parses arguments, sets up logging,
//! loads the configuration and dispatches to the publisher.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

use mediapub::cli::{Args, Commands};
use mediapub::config::Config;
use mediapub::error::PublishError;
use mediapub::logging;
use mediapub::model::MediaPackage;
use mediapub::provider::Quality;
use mediapub::publisher::Publisher;
use mediapub::setup::SetupManager;

const DEFAULT_CONFIG_FILE: &str = "mediapub.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Commands::InitConfig { output } = &args.command {
        Config::default().save_to_file(output)?;
        println!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    let _log_guard = logging::init(&config, args.verbose)?;
    info!("Starting mediapub");

    SetupManager::new(&config).initialize().await?;
    let publisher = Publisher::new(&config).await?;

    match args.command {
        Commands::Publish { input, platform } => {
            info!("Publishing {}", input.display());
            let media = publisher.publish_file(&input, &platform).await?;
            println!("Published {} as package {}", input.display(), media.id);
            print_packages(&[media]);
        }
        Commands::Batch { input_dir, platform } => {
            info!("Publishing packages from {}", input_dir.display());

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} packages")?
                    .progress_chars("#>-"),
            );
            let outcomes = publisher
                .publish_directory(&input_dir, &platform, Some(&pb))
                .await?;
            pb.finish_and_clear();

            let failed = outcomes.iter().filter(|outcome| outcome.result.is_err()).count();
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(state) => println!("OK    {} {} ({})", outcome.id, outcome.path.display(), state),
                    Err(e) => println!("FAIL  {} {} [{:?}]: {}", outcome.id, outcome.path.display(), e.kind(), e),
                }
            }
            println!("{} published, {} failed", outcomes.len() - failed, failed);
        }
        Commands::Retry { id } => {
            let media = publisher.retry(&id).await?;
            print_packages(&[media]);
        }
        Commands::Status { id } => {
            let packages = publisher.status(id.as_deref()).await?;
            if packages.is_empty() {
                println!("No packages recorded.");
            } else {
                print_packages(&packages);
            }
        }
        Commands::Info { id, quality } => {
            let quality = Quality::from_label(&quality).ok_or_else(|| {
                PublishError::Config(format!("Invalid quality '{}'. Valid qualities: mobile, sd, hd", quality))
            })?;
            let info = publisher.media_info(&id, quality).await?;

            println!("\nAvailable: {}", if info.available { "yes" } else { "no" });
            println!("{:<8} {:<12} {:<60}", "Quality", "Size", "Link");
            println!("{}", "-".repeat(80));
            for source in &info.sources {
                let size = match (source.width, source.height) {
                    (Some(width), Some(height)) => format!("{}x{}", width, height),
                    _ => "-".to_string(),
                };
                println!("{:<8} {:<12} {:<60}", format!("{:?}", source.quality), size, source.link);
            }
        }
        Commands::Remove { id } => {
            publisher.remove(&id).await?;
            println!("Removed package {}", id);
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn print_packages(packages: &[MediaPackage]) {
    println!(
        "\n{:<38} {:<24} {:<16} {:<38} {:<30}",
        "Package", "State", "Status", "Media", "Error"
    );
    println!("{}", "-".repeat(146));
    for package in packages {
        let error = package
            .error
            .as_ref()
            .map(|error| format!("{}: {}", error.code, error.message))
            .unwrap_or_default();
        println!(
            "{:<38} {:<24} {:<16} {:<38} {:<30}",
            package.id,
            package.state.to_string(),
            format!("{:?}", package.status),
            package.media_id.as_deref().unwrap_or("-"),
            error
        );
    }
}
