use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use reapr::config::Config;
use reapr::daemon::Daemon;
use reapr::domain::{Target, Worker, WorkerPurpose};
use reapr::env::SimEnvironment;
use reapr::storage::BatchLog;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reapr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("reapr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Build the demo environment: a handful of targets in various states and
/// a worker pool split between prepping and extraction
fn demo_environment(config: &Config) -> SimEnvironment {
    let env = SimEnvironment::new();

    let mut home = Worker::new("home", 512.0, WorkerPurpose::Prep);
    home.cores = 4;
    env.add_worker(home);
    env.add_worker(Worker::new("prep-1", 1024.0, WorkerPurpose::Prep));
    env.add_worker(Worker::new("extract-1", 2048.0, WorkerPurpose::Extract));
    env.add_worker(Worker::new("extract-2", 2048.0, WorkerPurpose::Extract));

    let mut nodes = vec![
        Target::new("copper-mine", 5.0, 80_000.0),
        Target::new("silver-vault", 10.0, 400_000.0),
        Target::new("gold-exchange", 25.0, 2_500_000.0),
    ];
    nodes[0].resource = 32_000.0;
    nodes[0].defense = 8.5;
    nodes[0].base_difficulty = 4.0;
    nodes[1].resource = 400_000.0;
    nodes[1].defense = 10.0;
    nodes[1].base_difficulty = 12.0;
    nodes[2].resource = 150_000.0;
    nodes[2].defense = 61.0;
    nodes[2].base_difficulty = 40.0;

    for mut node in nodes.drain(..) {
        node.extract_fraction = config.extraction.default_fraction;
        env.add_target(node);
    }
    env
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => run_daemon(config, None).await,
        Some(Commands::Run { ticks }) => run_daemon(config, *ticks).await,
        Some(Commands::Targets) => list_targets(config),
    }
}

async fn run_daemon(config: &Config, ticks: Option<u64>) -> Result<()> {
    info!("Launching scheduling driver (ticks: {:?})", ticks);
    println!("{}", "Starting scheduling driver...".cyan());

    let env = Arc::new(demo_environment(config));
    let batches = BatchLog::open(&config.storage.data_dir).context("Failed to open batch log")?;
    if !batches.is_empty() {
        println!("  Reloaded {} in-flight batches", batches.len());
    }

    let mut daemon = Daemon::with_environment(env, config.clone(), batches);

    tokio::select! {
        result = daemon.run(ticks) => {
            result.context("Driver loop failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c, shutting down");
            println!("{}", "Shutting down...".yellow());
        }
    }

    let stats = daemon.stats();
    println!(
        "{} {} ticks, {} batches dispatched, {} retired, {} jobs finished",
        "Done:".green(),
        stats.tick_count,
        stats.batches_started,
        stats.batches_retired,
        stats.jobs_finished,
    );
    Ok(())
}

fn list_targets(config: &Config) -> Result<()> {
    use reapr::env::TargetRegistry;

    info!("Listing demo targets");
    let env = demo_environment(config);

    let mut targets = env.targets();
    targets.sort_by(|a, b| b.score().total_cmp(&a.score()));

    println!("{}", "Targets in planning order:".cyan());
    for target in targets {
        let state = if target.is_optimal() {
            "optimal".green()
        } else {
            "needs prep".yellow()
        };
        println!(
            "  {:<16} defense {:>6.1} (floor {:>5.1})  resource {:>12.0} / {:>12.0}  [{}]",
            target.host,
            target.defense,
            target.defense_floor,
            target.resource,
            target.resource_ceiling,
            state,
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
