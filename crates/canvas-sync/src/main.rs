use anyhow::{Context, Result};
use canvas_sync::sync;
use canvas_sync::{auth, CanvasClient, Config, GoogleCalendarClient, Reconciler};
use clap::{Parser, Subcommand};
use shared_types::{normalize_event_id, RecordOutcome, RecordReport};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "canvas-sync")]
#[command(about = "Sync Canvas assignment due dates into Google Calendar")]
#[command(
    long_about = "Fetches upcoming deadlines from the Canvas API and creates one Google \
    Calendar event per item, ending at the due time.\n\n\
    Events are keyed by the Canvas id, so running the sync again updates \
    existing events instead of duplicating them."
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// When the file does not exist, settings are read from environment
    /// variables instead (CANVAS_API_URL, CANVAS_API_TOKEN, ...).
    #[arg(
        short,
        long,
        default_value = "canvas-sync.toml",
        env = "CANVAS_SYNC_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch deadlines and write them to the calendar (default)
    Sync {
        /// Show the events that would be written without authorizing
        /// with Google or changing the calendar.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the records Canvas returns, with their derived event ids
    Assignments,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Both HTTP stacks use rustls; pin one provider before any client is built
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync { dry_run: false }) {
        Commands::Sync { dry_run: false } => run_sync(&cli.config).await,
        Commands::Sync { dry_run: true } => run_dry_run(&cli.config).await,
        Commands::Assignments => list_assignments(&cli.config).await,
        Commands::Init { force } => init_config(&cli.config, force),
    }
}

async fn run_sync(config_path: &Path) -> Result<()> {
    tracing::info!("Starting Canvas to Google Calendar sync");

    // Every fatal check happens before the first request
    let config = Config::resolve(config_path).context("Invalid configuration")?;
    let fetcher = CanvasClient::new(&config).context("Failed to set up Canvas client")?;
    let authenticator = auth::authenticate(&config.calendar)
        .await
        .context("Could not authenticate with Google")?;
    let calendar = GoogleCalendarClient::new(authenticator)
        .context("Failed to set up Google Calendar client")?;

    let reconciler = Reconciler::new(calendar, config.calendar.calendar_id.clone());
    let report = sync::run_sync_with(&fetcher, &reconciler, print_record).await;

    println!();
    println!("Sync complete: {}", report.summary);
    Ok(())
}

async fn run_dry_run(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path).context("Invalid configuration")?;
    let fetcher = CanvasClient::new(&config).context("Failed to set up Canvas client")?;

    let records = sync::fetch_records(&fetcher).await;
    let planned = sync::plan(&records);

    println!(
        "Would write {} events to calendar '{}' ({} records without a due date):",
        planned.len(),
        config.calendar.calendar_id,
        records.len() - planned.len()
    );
    for event in &planned {
        println!(
            "  {}  {} -> {}  {}",
            event.event_id,
            event.start.format("%Y-%m-%d %H:%M"),
            event.end.format("%H:%M UTC"),
            event.summary
        );
    }
    Ok(())
}

async fn list_assignments(config_path: &Path) -> Result<()> {
    let config = Config::resolve(config_path).context("Invalid configuration")?;
    let fetcher = CanvasClient::new(&config).context("Failed to set up Canvas client")?;

    let records = fetcher
        .fetch_upcoming()
        .await
        .with_context(|| format!("Failed to fetch {}", fetcher.endpoint()))?;

    println!("Found {} records:", records.len());
    for record in &records {
        let due = record
            .due_at
            .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "no due date".to_string());
        println!(
            "  [{}] {} - {} ({})",
            normalize_event_id(&record.id),
            record.display_title().unwrap_or("(untitled)"),
            due,
            record.context_name.as_deref().unwrap_or("no course")
        );
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use `canvas-sync init --force` to overwrite.",
            path.display()
        );
    }

    let content = Config::example()
        .to_toml()
        .context("Failed to render example config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote example configuration to {}", path.display());
    println!(
        "Set canvas.api_token (or CANVAS_API_TOKEN) and place your Google credentials.json next to it."
    );
    Ok(())
}

fn print_record(entry: &RecordReport) {
    let id = entry.event_id.as_deref().unwrap_or(&entry.record_id);
    match &entry.outcome {
        RecordOutcome::Failed { reason } => println!(
            "{:>8}  {}  {}: {}",
            entry.outcome.as_str(),
            id,
            entry.summary,
            reason
        ),
        outcome => println!("{:>8}  {}  {}", outcome.as_str(), id, entry.summary),
    }
}
