use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use code_inventory::config::Config;
use code_inventory::control::ControlServer;
use code_inventory::crawler::{CrawlDependencies, CrawlOrchestrator, CrawlSettings};
use code_inventory::error::InventoryError;
use code_inventory::git::{ProcessRunner, RepositoryDetector};
use code_inventory::scanner::RepositoryScanner;
use code_inventory::store::{IngestionStore, SqliteStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BUILD_TIMESTAMP"),
    ", ",
    env!("GIT_DESCRIBE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "code-inventory",
    version = VERSION,
    about = "Discover git repositories and keep an inventory of their commits"
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "CODE_INVENTORY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Root directory to crawl; replaces the configured roots (repeatable)
    #[arg(long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawl service, reading control commands from stdin
    Serve {
        /// Start one crawl immediately
        #[arg(long)]
        execute_crawl: bool,
    },
    /// Run a single crawl and print its report
    Crawl,
    /// List repositories under the roots without extracting them
    Scan,
    /// Print store counters
    Stats,
    /// Print known projects
    Projects,
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) if e.is_user_error() => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    // The level comes from the config, so the subscriber starts after loading
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Config::source_path(cli.config.as_deref()) {
        Some(path) => tracing::info!("Loaded config from: {}", path.display()),
        None => tracing::info!("No config file found, using defaults"),
    }
    tracing::debug!("Inventory database: {}", config.storage.database_path.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run(cli.command, config));
    // stdin reads block a worker thread; do not wait for them forever
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// File, then environment, then command-line overrides
fn load_config(cli: &Cli) -> Result<Config, InventoryError> {
    let mut config = Config::new(cli.config.as_deref())?;
    if !cli.roots.is_empty() {
        config.crawl.root_directories = cli.roots.clone();
    }
    if let Some(db) = &cli.db {
        config.storage.database_path = db.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(command: Command, config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match command {
        Command::Serve { execute_crawl } => serve(config, execute_crawl, cancel).await,
        Command::Crawl => {
            let store = open_store(&config).await?;
            let deps = CrawlDependencies::with_git(&config.git, store);
            let orchestrator = CrawlOrchestrator::new(deps, CrawlSettings::from(&config.crawl));
            let report = orchestrator.crawl_once(&cancel).await?;
            print_json(&report)
        }
        Command::Scan => {
            let runner = Arc::new(
                ProcessRunner::new(&config.git.binary).with_timeout(config.git.metadata_timeout()),
            );
            let scanner = RepositoryScanner::new(Arc::new(RepositoryDetector::new(runner)));
            for path in scanner
                .scan_many(&config.crawl.root_directories, &cancel)
                .await
            {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Stats => {
            let store = open_store(&config).await?;
            print_json(&store.totals().await?)
        }
        Command::Projects => {
            let store = open_store(&config).await?;
            print_json(&store.list_projects().await?)
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn serve(config: Config, execute_crawl: bool, cancel: CancellationToken) -> Result<()> {
    let store = open_store(&config).await?;
    let deps = CrawlDependencies::with_git(&config.git, store.clone());
    let orchestrator = Arc::new(CrawlOrchestrator::new(
        deps,
        CrawlSettings::from(&config.crawl),
    ));
    let handle = orchestrator.handle();

    let worker = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(cancel).await })
    };

    if execute_crawl || config.crawl.execute_on_start {
        handle.trigger();
    }

    tracing::info!(
        "Serving control commands on stdin ({} roots configured)",
        config.crawl.root_directories.len()
    );
    let server = ControlServer::new(handle, store);
    let quit = server.serve_stdio(&cancel).await?;

    if quit {
        cancel.cancel();
    } else if !cancel.is_cancelled() {
        // Input closed: keep crawling on triggers already queued until Ctrl+C
        tracing::info!("Control input closed, press Ctrl+C to stop");
        cancel.cancelled().await;
    }

    worker.await.context("Crawl loop task failed")?;
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn IngestionStore>> {
    let store = SqliteStore::open(&config.storage.database_path)
        .await
        .with_context(|| {
            format!(
                "Could not open inventory at {}",
                config.storage.database_path.display()
            )
        })?;
    Ok(Arc::new(store))
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
