use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use portfolio_sentinel::config::Config;
use portfolio_sentinel::pipeline::{self, FetchMode, RunMode};

/// Scheduled portfolio-monitoring pipeline: harvest OHLCV history, compute
/// indicators, classify instrument states, dispatch oversold alerts.
#[derive(Debug, Parser)]
#[command(name = "sentinel")]
struct Cli {
    /// daily processes all watched holdings; intraday only the hot list
    #[arg(long, value_enum, default_value_t = RunMode::Daily)]
    mode: RunMode,

    /// Bar interval in minutes (24 means the daily bar)
    #[arg(long, default_value_t = 24)]
    interval: u32,

    /// delta fetches only new bars; full refetches the whole lookback
    #[arg(long, value_enum, default_value_t = FetchMode::Delta)]
    fetch_mode: FetchMode,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let timeframe = match pipeline::validate(cli.mode, cli.fetch_mode, cli.interval) {
        Ok(tf) => tf,
        Err(e) => {
            eprintln!("Argument error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = pipeline::run(&cfg, cli.mode, cli.interval, cli.fetch_mode, timeframe).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}
