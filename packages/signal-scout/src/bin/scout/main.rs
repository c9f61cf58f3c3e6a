//! Scout CLI
//!
//! Runs discovery cycles against the SQLite registry, prints registry
//! status, or verifies a single URL on demand.

mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signal_scout::{enrichment, ScoutEngine, SqliteRegistry, TavilySearcher};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser)]
#[command(name = "scout", version, about = "Streaming site discovery and verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run discovery cycles
    Run {
        /// Stop after this many cycles (default: run until interrupted)
        #[arg(long)]
        cycles: Option<u64>,

        /// Pause between cycles
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
    },
    /// Print registry counts by status
    Status,
    /// Verify one URL now and record the result
    Verify { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,signal_scout=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let engine = build_engine(&settings).await?;

    match cli.command {
        Command::Run { cycles, interval_secs } => run(&engine, cycles, Duration::from_secs(interval_secs)).await,
        Command::Status => {
            let stats = engine.status().await?;
            println!("Registry: {}", settings.database_url);
            println!("  total:       {}", stats.total);
            println!("  active:      {}", stats.active);
            println!("  quarantined: {}", stats.quarantined);
            println!("  inactive:    {}", stats.inactive);
            match stats.last_activity {
                Some(at) => println!("  last check:  {}", at.to_rfc3339()),
                None => println!("  last check:  never"),
            }
            Ok(())
        }
        Command::Verify { url } => {
            let (outcome, transition) = engine.verify_url(&url).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            println!("transition: {transition:?}");
            Ok(())
        }
    }
}

async fn build_engine(settings: &Settings) -> Result<ScoutEngine> {
    let config = settings.scout_config()?;

    let registry = SqliteRegistry::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open registry at {}", settings.database_url))?;
    let enricher = enrichment::from_config(&config.enrichment, settings.enrichment_api_key.clone())?;

    let mut builder = ScoutEngine::builder(config)
        .registry(Arc::new(registry))
        .enricher(enricher);
    match &settings.tavily_api_key {
        Some(key) => {
            tracing::info!(key = %key, "Query seeds enabled");
            builder = builder.searcher(Arc::new(TavilySearcher::new(key.clone())));
        }
        None => tracing::warn!("TAVILY_API_KEY not set, query seeds disabled"),
    }
    if let Some(dir) = &settings.reports_dir {
        builder = builder.reports_dir(dir);
    }

    builder.build().context("failed to build engine")
}

async fn run(engine: &ScoutEngine, cycles: Option<u64>, interval: Duration) -> Result<()> {
    tracing::info!(cycles = ?cycles, interval_secs = interval.as_secs(), "Starting scout");

    let mut completed = 0u64;
    loop {
        match engine.run_cycle().await {
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Cycle failed"),
        }
        completed += 1;
        if cycles.is_some_and(|n| completed >= n) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    let stats = engine.status().await?;
    tracing::info!(
        cycles = completed,
        total = stats.total,
        active = stats.active,
        quarantined = stats.quarantined,
        inactive = stats.inactive,
        "Scout stopped"
    );
    Ok(())
}
