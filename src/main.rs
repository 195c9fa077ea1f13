//! Regime signals - main entry point
//!
//! This binary provides five subcommands:
//! - run: Start the interval schedulers
//! - once: Run a single pipeline pass for one interval
//! - features: Offline feature generation from a candle CSV
//! - classify: Trend/flag and signals from persisted features
//! - analyze: Summarize a symbol's trade log

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use regime_signals::Interval;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "regime-signals")]
#[command(about = "Crypto feature pipeline with trend, flag and divergence signals", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "configs/default.json")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the periodic pipeline triggers
    Run {
        /// Seconds in-flight runs may take to finish after Ctrl+C
        #[arg(long, default_value = "30")]
        grace: u64,
    },

    /// Run one pipeline pass and exit
    Once {
        /// Candle interval (e.g. 5m, 15m, 1h)
        #[arg(short, long)]
        interval: Interval,

        /// Symbols to process (defaults to the configured universe)
        #[arg(short, long)]
        symbol: Vec<String>,
    },

    /// Compute features from a candle CSV
    Features {
        /// Candle CSV (Open Time, Open, High, Low, Close, Volume)
        #[arg(short, long)]
        input: PathBuf,

        /// Feature CSV to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Classify persisted features and list the signals that would fire
    Classify {
        #[arg(short, long)]
        symbol: String,

        #[arg(short, long, default_value = "1h")]
        interval: Interval,
    },

    /// Summarize a symbol's trade log
    Analyze {
        #[arg(short, long)]
        symbol: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format, no ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Once { .. } => "once",
        Commands::Features { .. } => "features",
        Commands::Classify { .. } => "classify",
        Commands::Analyze { .. } => "analyze",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Run { grace } => commands::run::run(cli.config, grace),
        Commands::Once { interval, symbol } => commands::once::run(cli.config, interval, symbol),
        Commands::Features { input, output } => commands::features::run(cli.config, input, output),
        Commands::Classify { symbol, interval } => {
            commands::classify::run(cli.config, symbol, interval)
        }
        Commands::Analyze { symbol } => commands::analyze::run(cli.config, symbol),
    }
}
