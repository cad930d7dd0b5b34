use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jangdan::config::Config;
use jangdan::engine::{JobEngine, LogRunner};
use jangdan::server::SchedulerServer;
use jangdan::storage::SqliteJobRepository;

#[derive(Parser)]
#[command(
    name = "jangdan",
    version,
    about = "Load-balanced, rhythm-preserving recurring job scheduler",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler engine and its HTTP API
    Serve {
        /// Bind address for the API (overrides JANGDAN_BIND_ADDRESS)
        #[arg(short, long)]
        bind: Option<String>,

        /// SQLite database path (overrides JANGDAN_SQLITE_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run a one-shot rebalance against the configured store
    Rebalance {
        /// Compute the report without moving anything
        #[arg(long)]
        preview: bool,

        /// SQLite database path (overrides JANGDAN_SQLITE_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the current load distribution
    Distribution {
        /// Reporting window in hours
        #[arg(short, long, default_value = "24")]
        window_hours: u32,

        /// SQLite database path (overrides JANGDAN_SQLITE_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve { bind, db } => {
            tracing::info!(bind = ?bind, db = ?db, "Starting serve command");
            serve(bind, db).await?;
        }

        Commands::Rebalance { preview, db } => {
            tracing::info!(preview = %preview, "Starting rebalance command");
            rebalance(preview, db).await?;
        }

        Commands::Distribution { window_hours, db } => {
            distribution(window_hours, db).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("jangdan=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("jangdan=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

/// Load the configuration and apply CLI overrides.
fn load_config(bind: Option<String>, db: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(bind) = bind {
        config.server.bind_address = bind.parse()?;
    }
    if let Some(db) = db {
        config.database.sqlite_path = db;
    }

    Ok(config)
}

/// Build an engine over the configured store and rebuild its index.
async fn bootstrap_engine(config: &Config) -> Result<Arc<JobEngine>> {
    if let Some(parent) = config.database.sqlite_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let repo = Arc::new(SqliteJobRepository::new(&config.database.sqlite_path)?);
    let engine = Arc::new(JobEngine::new(repo, Arc::new(LogRunner), config.engine.clone()));

    // The index must be complete before any traffic; a store failure
    // here aborts startup.
    let rebuilt = engine.rebuild().await?;
    tracing::info!(jobs = rebuilt, "Engine ready");

    Ok(engine)
}

async fn serve(bind: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let config = load_config(bind, db)?;

    if let Err(e) = jangdan::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed; continuing without metrics");
    }

    let engine = bootstrap_engine(&config).await?;

    // Shutdown is signalled to the tick loop and the HTTP server alike.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let tick_engine = engine.clone();
    let tick_handle = tokio::spawn(async move {
        tick_engine.run(shutdown_rx).await;
    });

    let server = SchedulerServer::new(config.server.clone(), engine);
    server
        .start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tick_handle.await;

    tracing::info!("jangdan stopped");
    Ok(())
}

async fn rebalance(preview: bool, db: Option<PathBuf>) -> Result<()> {
    let config = load_config(None, db)?;
    let engine = bootstrap_engine(&config).await?;

    let report = if preview {
        engine.preview_rebalance().await?
    } else {
        engine.rebalance().await?
    };

    println!("{}", report.display());
    Ok(())
}

async fn distribution(window_hours: u32, db: Option<PathBuf>) -> Result<()> {
    let config = load_config(None, db)?;
    let engine = bootstrap_engine(&config).await?;

    let report = engine.distribution(window_hours).await?;
    println!("{}", report.display());
    Ok(())
}
