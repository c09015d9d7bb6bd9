use anyhow::Result;
use clap::{Parser, Subcommand};
use fxengine::commands::{backtest, export_sample_data};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fxengine")]
#[command(about = "A signal-driven backtesting engine for FX strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a configuration file against a market data snapshot
    Backtest {
        /// Strategy template ID to run
        template_id: String,
        /// Path to the backtest configuration JSON
        #[arg(long, value_name = "PATH")]
        config: PathBuf,
        /// Path to the market data snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Strategy parameters as a JSON object, e.g. '{"fastPeriod": 8}'
        #[arg(long)]
        parameters: Option<String>,
    },
    /// Generate a deterministic synthetic snapshot for local experiments
    ExportSampleData {
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
        /// Symbol to stamp on the generated data
        #[arg(long, default_value = "EURUSD")]
        symbol: String,
        /// Number of days of candles to generate
        #[arg(long, default_value_t = 5)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            template_id,
            config,
            data_file,
            parameters,
        } => {
            backtest::run(&config, &data_file, &template_id, parameters.as_deref()).await?;
        }
        Commands::ExportSampleData {
            output,
            symbol,
            days,
        } => {
            export_sample_data::run(&output, &symbol, days).await?;
        }
    }

    Ok(())
}
