//! fitness-viz CLI - Inspect a local fitness dataset
//!
//! Usage:
//!   fitness-viz <db> bounds
//!   fitness-viz <db> traces [--years <n>] [--max-watts <w>]
//!   fitness-viz <db> cards [--limit <n>] [--map]
//!
//! Results are printed to stdout as JSON, log output goes to stderr.

use clap::{Parser, Subcommand};
use fitness_viz::{Dashboard, DashboardConfig, DashboardError, RendererKind, SqliteGateway};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fitness-viz")]
#[command(about = "Power/heart-rate traces and activity cards from a SQLite dataset", long_about = None)]
struct Cli {
    /// SQLite file exposing the `metrics` (and optionally `routes`) views
    db: PathBuf,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the date span of the metrics dataset
    Bounds,

    /// Aggregate one trace per recent calendar year
    Traces {
        /// Number of years (default from config)
        #[arg(short, long)]
        years: Option<u32>,

        /// Power ceiling in watts (default from config)
        #[arg(long)]
        max_watts: Option<f64>,
    },

    /// Render activity cards for the most recent routes
    Cards {
        /// Number of cards (default from config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Fit routes to a map view instead of a static path
        #[arg(long)]
        map: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DashboardConfig, DashboardError> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| DashboardError::Config {
                message: format!("{}: {}", path.display(), e),
            })?;
            DashboardConfig::from_json(&text)
        }
        None => Ok(DashboardConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<(), DashboardError> {
    let mut config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Traces {
            max_watts: Some(max_watts),
            ..
        } => config.default_max_watts = max_watts,
        Commands::Cards { map: true, .. } => config.renderer = RendererKind::Map,
        _ => {}
    }

    let gateway = SqliteGateway::open(&cli.db)?;
    let dashboard = Dashboard::open(gateway, config).await?;

    match cli.command {
        Commands::Bounds => print_json(&dashboard.bounds().await?),
        Commands::Traces { years, .. } => {
            let outcomes = dashboard.add_recent_years(years).await?;
            log::info!(
                "{} traces added (ceiling {} W)",
                outcomes.len(),
                dashboard.config().default_max_watts
            );
            println!("{}", dashboard.traces_json());
            Ok(())
        }
        Commands::Cards { limit, .. } => print_json(&dashboard.render_cards(limit).await),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DashboardError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
