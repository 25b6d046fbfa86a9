//! dnsprune: CLI for refreshing rule sources and validating blocklist shards.

use clap::Parser;
use dnsprune::{Config, CounterLayout, Pruner};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "dnsprune.yml";

#[derive(Parser)]
#[command(name = "dnsprune")]
#[command(author = "Kaitu.io")]
#[command(version)]
#[command(about = "Prune blocklist rules whose domains no longer resolve", long_about = None)]
struct Cli {
    /// Validate exactly one shard (1..=parts)
    #[arg(long)]
    part: Option<usize>,

    /// Re-fetch sources and re-split before doing anything else
    #[arg(long)]
    force_update: bool,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Concurrent DNS lookups
    #[arg(long)]
    workers: Option<usize>,

    /// Per-lookup DNS timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Failure counter layout: shared or per_shard
    #[arg(long)]
    counter_layout: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .filter_module("hickory_proto", log::LevelFilter::Warn)
        .filter_module("hickory_resolver", log::LevelFilter::Warn)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli)?;
    let pruner = Pruner::new(config);

    if cli.force_update {
        pruner.refresh()?;
    } else if !pruner.has_corpus() {
        log::warn!("Rule corpus or shards missing, fetching");
        pruner.refresh()?;
    }

    if let Some(part) = cli.part {
        let report = pruner.validate_shard(part)?;
        println!("{}", report.commit_stats());
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG)?,
        None => Config::default(),
    };

    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(timeout) = cli.timeout {
        config.dns_timeout_secs = timeout;
    }
    if let Some(layout) = &cli.counter_layout {
        config.counter_layout = CounterLayout::from_str(layout)
            .ok_or_else(|| format!("unknown counter layout: {}", layout))?;
    }

    config.validate()?;
    Ok(config)
}
