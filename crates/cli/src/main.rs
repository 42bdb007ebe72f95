mod cli;
mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use artvault_core::{
    load_config, load_config_from_env, validate_config, ArtworkCatalog, Config,
    DownloadOrchestrator, FsImageStore, ImageStore, MuseumRegistry, MuseumTag,
    OrchestratorConfig, ProgressStore, RunSummary, SqliteArtworkCatalog, SqliteProgressStore,
    StopHandle,
};

use cli::{Cli, Commands, IdentifierArgs, RunArgs, StatusArgs};

const DEFAULT_CONFIG: &str = "artvault.toml";
const CONFIG_ENV: &str = "ARTVAULT_CONFIG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load(cli.config.as_deref())?;

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
    }

    let store: Arc<dyn ProgressStore> = Arc::new(
        SqliteProgressStore::new(&config.database.path)
            .context("Failed to open progress store")?,
    );
    let catalog: Arc<dyn ArtworkCatalog> = Arc::new(
        SqliteArtworkCatalog::new(&config.database.path).context("Failed to open catalog")?,
    );
    let images: Arc<dyn ImageStore> = Arc::new(FsImageStore::new(&config.storage.images_dir));
    let registry =
        MuseumRegistry::from_config(&config.museums).context("Failed to create museum clients")?;

    let stop = StopHandle::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown_signal().await;
            warn!("Stop requested, finishing in-flight downloads...");
            stop.stop();
        }
    });

    let orchestrator = DownloadOrchestrator::new(
        OrchestratorConfig::from(&config.download),
        store,
        Arc::clone(&catalog),
        images,
        registry,
    )
    .with_stop_handle(stop);

    match &cli.command {
        Commands::Run(args) => run_downloads(&orchestrator, args, false).await?,
        Commands::RetryFailed(args) => run_downloads(&orchestrator, args, true).await?,
        Commands::Status(args) => print_status(&orchestrator, catalog.as_ref(), args)?,
        Commands::Failures(args) => print_failures(&orchestrator, args)?,
        Commands::Refetch(args) => refetch(&orchestrator, args)?,
        Commands::Purge(args) => purge(&orchestrator, args).await?,
    }

    if cli.metrics {
        for museum in orchestrator.registry().tags() {
            metrics::record_status(museum, &orchestrator.status(museum)?);
        }
        print!("{}", metrics::encode_metrics());
    }

    Ok(())
}

/// Load configuration: explicit path, then $ARTVAULT_CONFIG, then ./artvault.toml.
/// Without any file, defaults plus environment overrides are used.
fn load(explicit: Option<&Path>) -> Result<Config> {
    let requested = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    let config = match requested {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG);
            load_config(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG))?
        }
        None => {
            info!("No config file found, using defaults");
            load_config_from_env().context("Failed to load config from environment")?
        }
    };

    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);
    info!("Images directory: {:?}", config.storage.images_dir);
    Ok(config)
}

fn selected(orchestrator: &DownloadOrchestrator, museums: &[MuseumTag]) -> Vec<MuseumTag> {
    if museums.is_empty() {
        orchestrator.registry().tags()
    } else {
        museums.to_vec()
    }
}

async fn run_downloads(
    orchestrator: &DownloadOrchestrator,
    args: &RunArgs,
    retry_failed: bool,
) -> Result<()> {
    let options = args.options();
    let stop = orchestrator.stop_handle();

    for museum in selected(orchestrator, &args.museums) {
        if stop.is_stopped() {
            break;
        }
        let result = if retry_failed {
            orchestrator.retry_failed(museum, &options).await
        } else {
            orchestrator.run_museum(museum, &options).await
        };
        let summary = result.with_context(|| format!("Run failed for {}", museum))?;
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} ({}): downloaded {} ({} bytes), failed {}, retries {}{}",
        summary.museum,
        summary.museum.display_name(),
        summary.completed_this_run,
        summary.bytes_written_this_run,
        summary.failed_this_run,
        summary.retried_this_run,
        if summary.stopped { " [stopped]" } else { "" }
    );
    println!("  {}", summary.counts);
    for failure in &summary.failures {
        println!("  {}  {} ({})", failure.identifier, failure.reason, failure.kind);
    }
}

fn print_status(
    orchestrator: &DownloadOrchestrator,
    catalog: &dyn ArtworkCatalog,
    args: &StatusArgs,
) -> Result<()> {
    let mut rows = Vec::new();
    for museum in selected(orchestrator, &args.museums) {
        rows.push((museum, orchestrator.status(museum)?));
    }
    let stats = catalog.stats().context("Failed to read catalog stats")?;

    if args.json {
        let museums: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|(museum, summary)| {
                (
                    museum.as_str().to_string(),
                    serde_json::to_value(summary).unwrap_or_default(),
                )
            })
            .collect();
        let output = serde_json::json!({ "museums": museums, "catalog": stats });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (museum, summary) in &rows {
        println!("{:<4} {}", museum.to_string(), summary);
    }
    println!(
        "catalog: {} artworks, {} with images",
        stats.total_artworks, stats.with_images
    );
    Ok(())
}

fn print_failures(orchestrator: &DownloadOrchestrator, args: &StatusArgs) -> Result<()> {
    let mut failed = Vec::new();
    for museum in selected(orchestrator, &args.museums) {
        failed.extend(orchestrator.failed_items(museum)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&failed)?);
        return Ok(());
    }

    for item in &failed {
        println!(
            "{}  {}  attempts={} last_error={}",
            item.identifier,
            item.failure_reason.as_deref().unwrap_or("-"),
            item.attempt_count,
            item.last_error.as_deref().unwrap_or("-")
        );
    }
    println!("{} failed", failed.len());
    Ok(())
}

fn refetch(orchestrator: &DownloadOrchestrator, args: &IdentifierArgs) -> Result<()> {
    for identifier in &args.identifiers {
        orchestrator
            .refetch(identifier)
            .with_context(|| format!("Failed to refetch {}", identifier))?;
        println!("{} queued", identifier);
    }
    Ok(())
}

async fn purge(orchestrator: &DownloadOrchestrator, args: &IdentifierArgs) -> Result<()> {
    for identifier in &args.identifiers {
        let purged = orchestrator
            .purge(identifier)
            .await
            .with_context(|| format!("Failed to purge {}", identifier))?;
        if purged {
            println!("{} purged", identifier);
        } else {
            println!("{} not found", identifier);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
