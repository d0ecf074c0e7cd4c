//! The run orchestrator: one linear pass of
//! select tickers → harvest → analyze → alert.
//!
//! Two run modes: `daily` processes every watched holding (global feed
//! included); `intraday` re-polls only the hot list. Fetch mode `full`
//! backfills the wide lookback window and is only legal with `daily`.
//! Any stage error propagates out and terminates the run — there is no
//! checkpoint, the next scheduled invocation starts cold.

use chrono::Local;
use clap::ValueEnum;
use tracing::info;

use crate::config::{Config, Thresholds, ANALYSIS_TABLE, CONFIG_TABLE, HISTORY_TABLE, HOLDINGS_TABLE};
use crate::error::{AppError, Result};
use crate::store::StoreClient;
use crate::types::{HistoryRow, Holding, Timeframe};
use crate::{alerter, analyzer, harvest, watchlist};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Process every watched holding, global feed included.
    Daily,
    /// Re-poll only the hot list.
    Intraday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Fetch only bars newer than the last known bar per ticker.
    Delta,
    /// Refetch the entire lookback window (daily mode only).
    Full,
}

/// Reject invalid CLI combinations before any network call.
pub fn validate(mode: RunMode, fetch_mode: FetchMode, interval: u32) -> Result<Timeframe> {
    if fetch_mode == FetchMode::Full && mode != RunMode::Daily {
        return Err(AppError::Config(
            "full backfill (--fetch-mode full) is only available in daily mode".to_string(),
        ));
    }
    Timeframe::from_interval(interval).ok_or_else(|| {
        AppError::Config(format!(
            "unsupported interval {interval} — expected one of 24, 60, 30, 10, 1"
        ))
    })
}

/// Watched daily-mode tickers, partitioned into (global feed, domestic).
pub fn select_daily_tickers(holdings: &[Holding]) -> (Vec<String>, Vec<String>) {
    let mut global = Vec::new();
    let mut domestic = Vec::new();
    for h in holdings.iter().filter(|h| h.watch) {
        if h.asset_type.is_domestic() {
            domestic.push(h.ticker.clone());
        } else {
            global.push(h.ticker.clone());
        }
    }
    (global, domestic)
}

pub async fn run(
    cfg: &Config,
    mode: RunMode,
    interval: u32,
    fetch_mode: FetchMode,
    timeframe: Timeframe,
) -> Result<()> {
    info!(
        "==================== PIPELINE START (mode: {mode:?}, interval: {interval}, \
         fetch: {fetch_mode:?}) ===================="
    );
    let full_fetch = fetch_mode == FetchMode::Full;

    // Stage 0: open the store and read the run's inputs. Failure here is
    // fatal before anything is written.
    let store = StoreClient::open(cfg)?;
    let holdings_records = store.read_records(HOLDINGS_TABLE).await?;
    let holdings: Vec<Holding> = holdings_records
        .iter()
        .filter_map(Holding::from_record)
        .collect();
    info!("Loaded {} holdings.", holdings.len());
    let config = store.read_config(CONFIG_TABLE).await?;
    let th = Thresholds::from_table(&config);

    // Ticker selection per run mode.
    let (global_tickers, domestic_tickers) = match mode {
        RunMode::Daily => select_daily_tickers(&holdings),
        RunMode::Intraday => {
            let analysis = store.read_records(ANALYSIS_TABLE).await?;
            let hot = watchlist::select_hot_tickers(&holdings, &analysis, &th);
            // The domestic harvester skips any global-feed tickers that made
            // the hot list via priority flags.
            (Vec::new(), hot.into_iter().collect())
        }
    };

    // Prior history is only needed to compute delta resume points.
    let history: Vec<HistoryRow> = if full_fetch {
        Vec::new()
    } else {
        store
            .read_records(HISTORY_TABLE)
            .await?
            .iter()
            .filter_map(HistoryRow::from_record)
            .collect()
    };

    // Stage 1: global feed (daily mode only).
    if global_tickers.is_empty() {
        info!("No global-feed tickers selected for this run.");
    } else {
        harvest::run_global_update(cfg, &store, &global_tickers, full_fetch).await?;
    }

    // Stage 2: domestic harvesters.
    if domestic_tickers.is_empty() {
        info!("No domestic tickers selected for this run.");
    } else {
        harvest::run_domestic_update(
            cfg,
            &store,
            &holdings,
            &domestic_tickers,
            &history,
            timeframe,
            interval,
            full_fetch,
        )
        .await?;
    }

    // Stage 3: analyzer, unconditionally over the whole History table.
    analyzer::run_analyzer(&store, Local::now().naive_local()).await?;

    // Stage 4: alerter for this run's timeframe.
    alerter::run_alerter(cfg, &store, timeframe).await?;

    info!("==================== PIPELINE COMPLETE ====================");
    Ok(())
}
