use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use swarmsync::config::{get_config_path, load_config};
use swarmsync::trackers::magnet::validate_magnet;
use swarmsync::trackers::{HttpFetcher, TierSelector, TrackerCache};

#[derive(Parser, Debug)]
#[command(name = "swarmsync", about = "Tracker directory cache for embedded P2P sessions", version)]
struct Cli {
    #[arg(long, short = 'c', value_name = "FILE", env = "SWARMSYNC_CONFIG", global = true, help = "Config file (defaults to the platform config dir)")]
    config: Option<PathBuf>,

    #[arg(short = 'v', action = clap::ArgAction::Count, global = true, help = "More output (repeatable)")]
    verbose: u8,

    #[arg(long, value_enum, value_name = "LEVEL", global = true, help = "Explicit log level, overrides -v")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flattened endpoint list handed to the engine
    Trackers {
        #[arg(long, help = "Include the unsafe (ws/http) tiers")]
        boost: bool,
        #[arg(long, help = "Ignore the cached directory and fetch again")]
        refresh: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print counts for the cached directory
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Append missing directory endpoints to a magnet locator
    Augment {
        magnet: String,
        #[arg(long, help = "Include the unsafe (ws/http) tiers")]
        boost: bool,
    },
    /// Print where the config file lives
    ConfigPath,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.into(),
        (None, 0) => LevelFilter::Warn,
        (None, 1) => LevelFilter::Info,
        (None, 2) => LevelFilter::Debug,
        (None, _) => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("swarmsync")
        .build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialise logger")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => get_config_path().context("Failed to resolve config path")?,
    };
    if let Command::ConfigPath = cli.command {
        println!("{}", config_path.display());
        return Ok(());
    }

    let app_config = load_config(&config_path).context("Failed to load configuration")?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let cache = Arc::new(TrackerCache::new(&app_config.trackers, Arc::new(fetcher)));

    match cli.command {
        Command::Trackers { boost, refresh, json } => {
            if refresh {
                cache.refresh().await;
            }
            let include_unsafe = boost || app_config.sync.boost_by_default;
            let endpoints = cache.flatten(include_unsafe).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&endpoints)?);
            } else {
                for endpoint in &endpoints {
                    println!("{}", endpoint);
                }
            }
        }
        Command::Stats { json } => {
            // Stats never fetch on their own; make sure something is cached
            cache.get(TierSelector::All).await;
            let stats = cache.stats().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("cached:        {}", stats.cached);
                println!("from fallback: {}", stats.from_fallback);
                println!("wss:           {}", stats.wss_count);
                println!("https:         {}", stats.https_count);
                println!("ws:            {}", stats.ws_count);
                println!("http:          {}", stats.http_count);
                println!("safe/unsafe:   {}/{}", stats.safe_count, stats.unsafe_count);
                println!("total:         {}", stats.total_count);
            }
        }
        Command::Augment { magnet, boost } => {
            validate_magnet(&magnet)?;
            let include_unsafe = boost || app_config.sync.boost_by_default;
            println!("{}", cache.append_to_identifier(magnet.trim(), include_unsafe).await);
        }
        Command::ConfigPath => {}
    }

    cache.teardown().await;
    Ok(())
}
