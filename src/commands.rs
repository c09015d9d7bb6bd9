#[path = "commands/backtest.rs"]
pub mod backtest;

#[path = "commands/export_sample_data.rs"]
pub mod export_sample_data;
