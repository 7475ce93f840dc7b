use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labeling_media::{MediaConfig, MediaPipeline, StaticToken};

#[derive(Parser)]
#[command(name = "media-prefetch")]
#[command(about = "Warm the media cache for a labeling task", long_about = None)]
struct Cli {
    /// Task (scope) the media belongs to
    #[arg(short, long)]
    scope: String,

    /// Backend base URL (overrides MEDIA_BASE_URL)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Bearer token for the media endpoint
    #[arg(short, long, env = "MEDIA_TOKEN")]
    token: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Media file paths to fetch
    #[arg(required = true)]
    paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "labeling_media=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = MediaConfig::from_env().context("invalid media configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let pipeline = MediaPipeline::new(config, Arc::new(StaticToken(cli.token)))
        .context("failed to build media pipeline")?;

    let report = pipeline.preload(cli.paths, &cli.scope).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Loaded {}/{} media files for {}",
            report.loaded.len(),
            report.requested,
            cli.scope
        );
        for (key, error) in &report.failed {
            println!("  failed {}: {}", key.path(), error);
        }
        println!("{}", pipeline.cache().stats().await);
    }

    if !report.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}
