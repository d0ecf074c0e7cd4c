//! History harvesting stages: per-source fetchers plus the update runners
//! that normalize bars into History rows and append them to the store.
//!
//! Per-ticker failures are logged and skipped — one dead ticker never aborts
//! the batch. Only the final store append is fatal to the stage.

pub mod cbr;
pub mod global;
pub mod moex;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use tracing::{error, info, warn};

use crate::config::{
    Config, BROWSER_USER_AGENT, FEED_TIMEOUT_SECS, FULL_LOOKBACK_DAYS,
    GLOBAL_DELTA_LOOKBACK_DAYS, GLOBAL_FEED_TIMEOUT_SECS, GLOBAL_PACING_MS, HISTORY_TABLE,
};
use crate::error::Result;
use crate::store::StoreClient;
use crate::types::{AssetType, HistoryRow, Holding, OhlcvBar, Timeframe};

/// Per-ticker fetch start. Delta mode resumes the day after the last known
/// bar for (ticker, timeframe); full mode (or no prior history) uses the
/// wide two-year lookback. Full mode refetches everything — duplicates are
/// possible and not deduplicated.
pub fn start_date(
    ticker: &str,
    timeframe: &str,
    history: &[HistoryRow],
    full_fetch: bool,
    today: NaiveDate,
) -> NaiveDate {
    let wide = today - Days::new(FULL_LOOKBACK_DAYS as u64);
    if full_fetch {
        return wide;
    }
    history
        .iter()
        .filter(|r| r.ticker == ticker && r.timeframe == timeframe)
        .map(|r| r.date)
        .max()
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .unwrap_or(wide)
}

/// Normalize a bar into a History row: Date, Timeframe, Ticker, O, H, L, C, V.
/// Gaps become empty cells, which parse back as None.
pub fn bar_to_row(bar: &OhlcvBar, timeframe: &str, ticker: &str) -> Vec<String> {
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    vec![
        bar.date.format("%Y-%m-%d").to_string(),
        timeframe.to_string(),
        ticker.to_string(),
        cell(bar.open),
        cell(bar.high),
        cell(bar.low),
        cell(bar.close),
        cell(bar.volume),
    ]
}

/// Harvest domestic tickers (MOEX boards and CBR fixings) and append the
/// normalized rows to History in one write.
pub async fn run_domestic_update(
    cfg: &Config,
    store: &StoreClient,
    holdings: &[Holding],
    tickers: &[String],
    history: &[HistoryRow],
    timeframe: Timeframe,
    interval: u32,
    full_fetch: bool,
) -> Result<()> {
    let mode = if full_fetch { "full backfill" } else { "delta update" };
    info!("--- History update ({mode}, timeframe {timeframe}) ---");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(FEED_TIMEOUT_SECS))
        .build()?;
    let today = Local::now().date_naive();
    let by_ticker: HashMap<&str, &Holding> =
        holdings.iter().map(|h| (h.ticker.as_str(), h)).collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for ticker in tickers {
        let Some(holding) = by_ticker.get(ticker.as_str()) else {
            warn!("ticker '{ticker}' is not in Holdings, skipping");
            continue;
        };
        let start = start_date(ticker, timeframe.label(), history, full_fetch, today);

        let fetched = match holding.asset_type {
            AssetType::CurrencyCbr => {
                cbr::fetch_history(&http, &cfg.cbr_xml_url, ticker, start, today).await
            }
            AssetType::StockMoex | AssetType::BondMoex | AssetType::CurrencyMoex => {
                moex::fetch_history(
                    &http,
                    &cfg.moex_iss_url,
                    ticker,
                    holding.asset_type,
                    start,
                    interval,
                )
                .await
            }
            // Global-feed tickers are handled by their own stage.
            AssetType::MacroGlobal => continue,
        };

        match fetched {
            Ok(bars) if bars.is_empty() => {
                info!("    - no new bars for {ticker}");
            }
            Ok(bars) => {
                rows.extend(bars.iter().map(|b| bar_to_row(b, timeframe.label(), ticker)));
            }
            Err(e) => {
                error!("    - fetch failed for {ticker}: {e} — skipping ticker");
            }
        }
    }

    if rows.is_empty() {
        info!("No new history rows to append.");
        return Ok(());
    }
    info!("Appending {} new rows to {HISTORY_TABLE}...", rows.len());
    store.append_rows(HISTORY_TABLE, &rows).await?;
    info!("History append complete.");
    Ok(())
}

/// Harvest global-feed tickers (daily bars only) with inter-request pacing
/// and append the rows to History.
pub async fn run_global_update(
    cfg: &Config,
    store: &StoreClient,
    tickers: &[String],
    full_fetch: bool,
) -> Result<()> {
    let mode = if full_fetch { "full backfill" } else { "delta update" };
    info!("--- Global feed update ({mode}) ---");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(GLOBAL_FEED_TIMEOUT_SECS))
        .user_agent(BROWSER_USER_AGENT)
        .build()?;
    let today = Local::now().date_naive();
    let lookback = if full_fetch {
        FULL_LOOKBACK_DAYS
    } else {
        GLOBAL_DELTA_LOOKBACK_DAYS
    };
    let start = today - Days::new(lookback as u64);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (i, ticker) in tickers.iter().enumerate() {
        if i > 0 {
            // Fixed pacing between tickers — the provider throttles bursts.
            tokio::time::sleep(Duration::from_millis(GLOBAL_PACING_MS)).await;
        }
        match global::fetch_history(&http, &cfg.global_chart_url, ticker, start, today).await {
            Ok(bars) if bars.is_empty() => {
                info!("    - no bars returned for {ticker}");
            }
            Ok(bars) => {
                info!("    - {} bars for {ticker}", bars.len());
                rows.extend(
                    bars.iter()
                        .map(|b| bar_to_row(b, Timeframe::D1.label(), ticker)),
                );
            }
            Err(e) => {
                error!("    - global fetch failed for {ticker}: {e} — skipping ticker");
            }
        }
    }

    if rows.is_empty() {
        info!("No new global rows to append.");
        return Ok(());
    }
    info!("Appending {} global rows to {HISTORY_TABLE}...", rows.len());
    store.append_rows(HISTORY_TABLE, &rows).await?;
    info!("Global history append complete.");
    Ok(())
}
