use anyhow::Context;
use brevet_sync::config::{Credentials, Overrides, Settings};
use brevet_sync::geocode::{Enricher, GoogleGeocoder, IntervalThrottle};
use brevet_sync::http::build_client;
use brevet_sync::index::{AlgoliaIndex, SearchIndex};
use brevet_sync::logging;
use brevet_sync::pipeline::{self, Pipeline, PipelineOptions};
use brevet_sync::progress::BarProgress;
use brevet_sync::sources::create_sources;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "brevet_sync")]
#[command(about = "Aggregates brevet calendars into the brevets search index")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to brevet_sync.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Staging file path
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every enabled source and write new brevets to the staging file
    Export {
        /// Sources to run (comma-separated). Available: acp, map, lrm, usa, auk, belgium, netherlands, ireland, italy
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,
        /// Keep events that are already indexed
        #[arg(long)]
        no_filter: bool,
        /// Skip coordinate lookup
        #[arg(long)]
        no_geocode: bool,
    },
    /// Upload the staging file to the index
    Publish,
    /// Rewrite the staging file with one brevet per identity
    Reformat {
        /// Start from the current index contents instead of the staging file
        #[arg(long)]
        from_index: bool,
    },
}

fn algolia_index(settings: &Settings, credentials: &Credentials, client: reqwest::Client) -> AlgoliaIndex {
    AlgoliaIndex::new(
        client,
        &credentials.algolia_app,
        &credentials.algolia_read,
        &credentials.algolia_write,
        &settings.index_name,
    )
}

async fn export(settings: Settings) -> anyhow::Result<()> {
    let credentials = Credentials::from_env()?;
    credentials.check_for(&settings)?;
    let client = build_client(&settings.user_agent, settings.http_timeout_secs)?;

    let sources = create_sources(&settings, Some(&credentials), &client)?;
    let index = algolia_index(&settings, &credentials, client.clone());
    let enricher = if settings.geocode {
        let geocoder = GoogleGeocoder::new(client.clone(), credentials.google_maps_key()?);
        Some(Enricher::new(
            Box::new(geocoder),
            Box::new(IntervalThrottle::new(Duration::from_millis(settings.geocode_interval_ms))),
            Box::new(BarProgress::new("geocoding")),
        ))
    } else {
        None
    };

    info!(sources = ?settings.sources, filter = settings.filter, geocode = settings.geocode, "Starting export");
    let pipeline = Pipeline::new(sources, Box::new(index), enricher, PipelineOptions::from(&settings))?;
    let report = pipeline.run().await.context("export failed, staging file left untouched")?;

    println!("\n📊 Export results:");
    for count in &report.sources {
        println!("   {}: {} events", count.source, count.events);
    }
    println!("   Duplicates dropped: {}", report.duplicates_dropped);
    println!("   New: {}  Already indexed: {}", report.fresh, report.existing);
    if let Some(enrichment) = &report.enrichment {
        println!(
            "   Geocoded: {}/{} ({} already located)",
            enrichment.resolved, enrichment.attempted, enrichment.skipped
        );
    }
    println!("Exported {} brevets to {}", report.written, report.output_file);
    Ok(())
}

async fn publish(settings: Settings) -> anyhow::Result<()> {
    let credentials = Credentials::from_env()?;
    let client = build_client(&settings.user_agent, settings.http_timeout_secs)?;
    let index = algolia_index(&settings, &credentials, client);

    let summary = std::env::var("GITHUB_STEP_SUMMARY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let written = pipeline::publish(&index, &settings.staging_path, summary.as_deref()).await?;
    println!("Indexed {} brevets", written);
    Ok(())
}

async fn reformat(settings: Settings, from_index: bool) -> anyhow::Result<()> {
    let index: Option<Box<dyn SearchIndex>> = if from_index {
        let credentials = Credentials::from_env()?;
        let client = build_client(&settings.user_agent, settings.http_timeout_secs)?;
        Some(Box::new(algolia_index(&settings, &credentials, client)))
    } else {
        None
    };
    let report = pipeline::reformat(&settings.staging_path, index.as_deref()).await?;
    println!("Cleaned {} brevets into {} brevets", report.before, report.after);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut overrides = Overrides {
        output: cli.output.clone(),
        ..Default::default()
    };
    if let Commands::Export {
        sources,
        no_filter,
        no_geocode,
    } = &cli.command
    {
        overrides.sources = sources.clone();
        overrides.no_filter = *no_filter;
        overrides.no_geocode = *no_geocode;
    }
    let settings = Settings::load(cli.config.as_deref())?.apply(&overrides)?;

    let result = match cli.command {
        Commands::Export { .. } => export(settings).await,
        Commands::Publish => publish(settings).await,
        Commands::Reformat { from_index } => reformat(settings, from_index).await,
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
