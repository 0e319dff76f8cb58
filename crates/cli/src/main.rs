use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use api_client::VideoApiClient;
use manifest::ManifestWriter;
use orchestrator::{BatchOptions, Orchestrator, Outcome};
use phrase_loader::collect_phrases;
use protocol::AppConfig;
use relay::{ArtifactStore, Broker, CompletionHandler, CompletionRelay, IngressRelay, PgRequestStore};

/// SignVid - sign-language video generation front end and queue relays
#[derive(Parser)]
#[command(name = "signvid")]
#[command(about = "Submit phrases for sign-language video rendering and run the queue relays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Avatar that performs the signed rendition.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Avatar {
    Icaro,
    Hosana,
}

impl Avatar {
    fn as_str(&self) -> &'static str {
        match self {
            Avatar::Icaro => "icaro",
            Avatar::Hosana => "hosana",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate videos for a set of phrases
    Generate {
        /// Phrases, or paths to .txt files with one phrase per line
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Avatar to render with (defaults to SIGNVID_AVATAR or icaro)
        #[arg(long)]
        avatar: Option<Avatar>,

        /// Directory for downloaded videos and the manifest
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Maximum phrases in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Translate phrases to gloss before submitting
        #[arg(long)]
        translate: bool,
    },

    /// Forward inbound submissions onto the rendering work queue
    IngressRelay,

    /// Store finished artifacts and resolve request records
    CompletionRelay,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Generate {
            inputs,
            avatar,
            out_dir,
            concurrency,
            translate,
        } => handle_generate(config, inputs, avatar, out_dir, concurrency, translate).await?,
        Commands::IngressRelay => handle_ingress(config).await?,
        Commands::CompletionRelay => handle_completion(config).await?,
    }

    Ok(())
}

/// Handle the 'generate' command
async fn handle_generate(
    config: AppConfig,
    inputs: Vec<String>,
    avatar: Option<Avatar>,
    out_dir: Option<PathBuf>,
    concurrency: Option<usize>,
    translate: bool,
) -> Result<()> {
    if translate && config.api.translate_url.is_none() {
        bail!("--translate requires SIGNVID_TRANSLATE_URL to be set");
    }

    let phrases = collect_phrases(&inputs).context("Failed to collect phrases")?;
    let out_dir = out_dir.unwrap_or(config.out_dir);
    println!(
        "Generating {} video(s) into {}...",
        phrases.len(),
        out_dir.display()
    );

    let client = VideoApiClient::new(&config.api).context("Failed to build API client")?;
    let writer = Arc::new(
        ManifestWriter::open(out_dir.join("manifest.jsonl"))
            .context("Failed to open manifest")?,
    );
    let orchestrator = Orchestrator::new(
        client,
        writer,
        BatchOptions {
            poll: config.poll,
            out_dir,
            variant: avatar
                .map(|a| a.as_str().to_string())
                .unwrap_or(config.default_variant),
            concurrency: concurrency.unwrap_or(config.concurrency),
            translate,
        },
    );

    let start = Instant::now();
    let report = orchestrator.run_batch(phrases).await?;

    println!(
        "\n{} {}/{} phrase(s) succeeded in {:?}",
        if report.all_succeeded() { "✓".green() } else { "✗".red() },
        report.success_count(),
        report.outcomes.len(),
        start.elapsed()
    );
    for result in &report.outcomes {
        match &result.outcome {
            Outcome::Generated { path, .. } => {
                println!("  {} {} -> {}", "✓".green(), result.phrase.text, path.display());
            }
            Outcome::AlreadyRecorded { path } => {
                let shown = path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(previous run)".to_string());
                println!(
                    "  {} {} -> {} {}",
                    "✓".green(),
                    result.phrase.text,
                    shown,
                    "(skipped)".dimmed()
                );
            }
            Outcome::Failed { status, reason, .. } => {
                println!("  {} {} ({})", "✗".red(), result.phrase.text, status);
                eprintln!("    {reason}");
            }
        }
    }

    if !report.all_succeeded() {
        bail!(
            "{} phrase(s) did not produce a video",
            report.failures().count()
        );
    }
    Ok(())
}

/// Handle the 'ingress-relay' command; runs until the broker is lost.
async fn handle_ingress(config: AppConfig) -> Result<()> {
    let broker = Broker::connect(&config.broker)
        .await
        .context("Failed to connect to broker")?;
    IngressRelay::new(broker, config.broker)
        .run()
        .await
        .context("Ingress relay stopped")?;
    Ok(())
}

/// Handle the 'completion-relay' command; runs until the broker is lost.
async fn handle_completion(config: AppConfig) -> Result<()> {
    let broker = Broker::connect(&config.broker)
        .await
        .context("Failed to connect to broker")?;
    let store = PgRequestStore::connect(&config.store.database_url)
        .await
        .context("Failed to connect to request store")?;
    let handler = CompletionHandler::new(store, ArtifactStore::new(&config.store.storage_dir));
    CompletionRelay::new(broker, handler, config.broker)
        .run()
        .await
        .context("Completion relay stopped")?;
    Ok(())
}
