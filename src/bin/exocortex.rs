//! Session-log appender: reads a free-text session log from disk and appends
//! it as one timestamped row to the Dailies table of the knowledge
//! spreadsheet. An empty log file is a no-op, not an error.

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use portfolio_sentinel::config::Config;
use portfolio_sentinel::error::{AppError, Result};
use portfolio_sentinel::store::{Credentials, StoreClient};

const DAILIES_TABLE: &str = "Dailies";

#[derive(Debug, Parser)]
#[command(name = "exocortex")]
struct Cli {
    /// Session log file to append
    #[arg(long, default_value = "session_log.txt")]
    log_file: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cfg = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(&cfg, &cli.log_file).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: &Config, log_file: &str) -> Result<()> {
    info!("--- Exocortex session logger ---");

    let session_text = std::fs::read_to_string(log_file)
        .map_err(|e| AppError::Config(format!("cannot read log file '{log_file}': {e}")))?;
    if session_text.trim().is_empty() {
        warn!("Log file '{log_file}' is empty — nothing to record.");
        return Ok(());
    }

    let creds = Credentials::load(&cfg.credentials_path)?;
    let spreadsheet_id = creds.exocortex_spreadsheet_id.clone().ok_or_else(|| {
        AppError::Credentials(
            "key file has no 'exocortex_spreadsheet_id' — cannot locate the knowledge spreadsheet"
                .to_string(),
        )
    })?;
    let store = StoreClient::open_spreadsheet(cfg, &creds, spreadsheet_id)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    store
        .append_rows(DAILIES_TABLE, &[vec![timestamp.clone(), session_text]])
        .await?;
    info!("Session from {timestamp} recorded in '{DAILIES_TABLE}'.");
    Ok(())
}
