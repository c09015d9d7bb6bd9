use crate::backtester::Backtester;
use crate::config::BacktestConfiguration;
use crate::indicators::BuiltinIndicatorProvider;
use crate::market_data::SnapshotDataSource;
use crate::strategy::create_strategy;
use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub async fn run(
    config_path: &Path,
    data_file: &Path,
    template_id: &str,
    parameters_json: Option<&str>,
) -> Result<()> {
    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read configuration {}", config_path.display()))?;
    let config: BacktestConfiguration = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid configuration file {}", config_path.display()))?;

    let parameters: HashMap<String, f64> = match parameters_json {
        Some(json) => serde_json::from_str(json).context("Invalid strategy parameter JSON")?,
        None => HashMap::new(),
    };

    let data_source = SnapshotDataSource::load_from_file(data_file)?;
    let indicator_provider = BuiltinIndicatorProvider::new();
    let mut strategy = create_strategy(template_id, parameters)?;

    let backtester = Backtester::new(&config, &data_source, &indicator_provider);
    let results = backtester.run(strategy.as_mut()).await?;

    info!(
        "Backtest {} finished with {} trades",
        results.id, results.performance.total_trades
    );
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
