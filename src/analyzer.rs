//! Technical analyzer: reads the entire History table, recomputes indicators
//! for every (ticker, timeframe) pair, and rewrites the Analysis table as a
//! single full overwrite. Never incremental — stale rows for delisted or
//! renamed tickers simply vanish on the next run.
//!
//! All per-pair computation happens in memory before the write, so a crash
//! mid-run leaves the previous Analysis table intact.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::config::{Thresholds, ANALYSIS_TABLE, CONFIG_TABLE, HISTORY_TABLE};
use crate::error::Result;
use crate::indicators;
use crate::locale::format_metric;
use crate::store::StoreClient;
use crate::types::{AnalysisRecord, HistoryRow, State};

/// SMA(50) needs 50 bars; anything shorter is "insufficient data", a skip
/// rather than an error.
pub const MIN_BARS: usize = 50;

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: State,
    pub rsi_14: Option<f64>,
    pub ma_20: Option<f64>,
    pub ma_50: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
}

/// Evaluate one close series. Indicators run over the full series but only
/// the latest bar's values are kept.
pub fn evaluate(closes: &[f64], th: &Thresholds) -> Option<Snapshot> {
    if closes.len() < MIN_BARS {
        return None;
    }
    let rsi_14 = indicators::rsi(closes, 14);
    let bands = indicators::bollinger(closes, 20, 2.0);
    Some(Snapshot {
        state: State::from_rsi(rsi_14, th),
        rsi_14,
        ma_20: indicators::sma(closes, 20),
        ma_50: indicators::sma(closes, 50),
        bb_upper: bands.map(|b| b.0),
        bb_lower: bands.map(|b| b.1),
    })
}

/// Build the full Analysis batch from parsed History rows. Deterministic for
/// a fixed `now`: pairs are enumerated in first-seen order and each pair is
/// processed independently.
pub fn build_analysis(
    history: &[HistoryRow],
    th: &Thresholds,
    now: NaiveDateTime,
) -> Vec<AnalysisRecord> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for row in history {
        let key = (row.ticker.clone(), row.timeframe.clone());
        if !pairs.contains(&key) {
            pairs.push(key);
        }
    }
    info!("Found {} distinct (ticker, timeframe) pairs to analyze.", pairs.len());

    let last_update = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let mut records = Vec::new();
    for (ticker, timeframe) in &pairs {
        let mut rows: Vec<&HistoryRow> = history
            .iter()
            .filter(|r| &r.ticker == ticker && &r.timeframe == timeframe)
            .collect();
        rows.sort_by_key(|r| r.date);

        // Indicator math wants a contiguous complete series — drop bars with
        // any missing OHLC cell.
        let closes: Vec<f64> = rows
            .iter()
            .filter(|r| {
                r.open.is_some() && r.high.is_some() && r.low.is_some() && r.close.is_some()
            })
            .filter_map(|r| r.close)
            .collect();

        let Some(snapshot) = evaluate(&closes, th) else {
            warn!(
                "    - insufficient data for {ticker} on {timeframe} \
                 ({} complete bars, need {MIN_BARS})",
                closes.len()
            );
            continue;
        };

        info!(
            "    - {ticker} {timeframe}: state {}, RSI {}",
            snapshot.state,
            format_metric(snapshot.rsi_14)
        );
        records.push(AnalysisRecord {
            ticker: ticker.clone(),
            timeframe: timeframe.clone(),
            state: snapshot.state,
            last_update: last_update.clone(),
            rsi_14: format_metric(snapshot.rsi_14),
            ma_20: format_metric(snapshot.ma_20),
            ma_50: format_metric(snapshot.ma_50),
            bb_upper: format_metric(snapshot.bb_upper),
            bb_lower: format_metric(snapshot.bb_lower),
            pattern_found: "N/A".to_string(),
            recommendation: snapshot.state.recommendation().to_string(),
        });
    }
    records
}

/// The analyzer stage: load History and Config, recompute, overwrite
/// Analysis. A run that produces zero qualifying rows leaves the table
/// untouched.
pub async fn run_analyzer(store: &StoreClient, now: NaiveDateTime) -> Result<()> {
    info!("--- Analyzer: full recompute over {HISTORY_TABLE} ---");

    let config = store.read_config(CONFIG_TABLE).await?;
    let th = Thresholds::from_table(&config);

    let history_records = store.read_records(HISTORY_TABLE).await?;
    if history_records.is_empty() {
        warn!("{HISTORY_TABLE} is empty — nothing to analyze.");
        return Ok(());
    }
    let history: Vec<HistoryRow> = history_records
        .iter()
        .filter_map(HistoryRow::from_record)
        .collect();

    let records = build_analysis(&history, &th, now);
    if records.is_empty() {
        warn!("No pairs produced analysis rows — {ANALYSIS_TABLE} left unmodified.");
        return Ok(());
    }

    info!("Rewriting {ANALYSIS_TABLE} with {} rows...", records.len());
    let rows: Vec<Vec<String>> = records.iter().map(AnalysisRecord::to_row).collect();
    store
        .overwrite(ANALYSIS_TABLE, &AnalysisRecord::HEADER, &rows)
        .await?;
    info!("{ANALYSIS_TABLE} fully rebuilt.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn thresholds() -> Thresholds {
        Thresholds {
            warning: 35.0,
            alert: 30.0,
            proximity_pct: 15.0,
        }
    }

    fn daily_rows(ticker: &str, closes: &[f64]) -> Vec<HistoryRow> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| HistoryRow {
                date: start + Days::new(i as u64),
                timeframe: "D1".to_string(),
                ticker: ticker.to_string(),
                open: Some(close),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(1000.0),
            })
            .collect()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn fewer_than_50_bars_is_insufficient() {
        let closes: Vec<f64> = (0..49).map(|i| 100.0 + i as f64).collect();
        assert!(evaluate(&closes, &thresholds()).is_none());
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        assert!(evaluate(&closes, &thresholds()).is_some());
    }

    #[test]
    fn falling_series_goes_oversold_with_alert_sent() {
        // 60 daily bars in steady decline → RSI pinned near 0, well under
        // the alert level of 30.
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let history = daily_rows("ABC", &closes);

        let records = build_analysis(&history, &thresholds(), now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, State::Oversold);
        assert_eq!(records[0].recommendation, "Alert Sent");
        assert_eq!(records[0].ticker, "ABC");
        assert_eq!(records[0].timeframe, "D1");
    }

    #[test]
    fn rising_series_stays_neutral() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let records = build_analysis(&daily_rows("UP", &closes), &thresholds(), now());
        assert_eq!(records[0].state, State::Neutral);
        assert_eq!(records[0].recommendation, "-");
    }

    #[test]
    fn analysis_is_idempotent_for_fixed_now() {
        let closes: Vec<f64> = (0..70).map(|i| 100.0 + ((i * 7) % 13) as f64).collect();
        let mut history = daily_rows("AAA", &closes);
        history.extend(daily_rows("BBB", &closes));

        let first = build_analysis(&history, &thresholds(), now());
        let second = build_analysis(&history, &thresholds(), now());
        assert_eq!(first, second);
    }

    #[test]
    fn incomplete_bars_are_dropped_before_evaluation() {
        let closes: Vec<f64> = (0..55).map(|i| 100.0 + i as f64).collect();
        let mut history = daily_rows("GAP", &closes);
        // knock out OHLC cells on ten rows → only 45 complete bars remain
        for row in history.iter_mut().take(10) {
            row.open = None;
        }
        let records = build_analysis(&history, &thresholds(), now());
        assert!(records.is_empty());
    }

    #[test]
    fn one_record_per_pair() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let mut history = daily_rows("SBER", &closes);
        let mut hourly = daily_rows("SBER", &closes);
        for row in &mut hourly {
            row.timeframe = "H1".to_string();
        }
        history.extend(hourly);

        let records = build_analysis(&history, &thresholds(), now());
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].timeframe, records[1].timeframe);
    }

    #[test]
    fn metrics_are_locale_formatted() {
        let closes: Vec<f64> = (0..60).map(|i| 1000.0 + i as f64 * 10.0).collect();
        let records = build_analysis(&daily_rows("FMT", &closes), &thresholds(), now());
        // SMA(20) over the last 20 closes of an arithmetic series
        assert_eq!(records[0].ma_20, "1 495,00");
        assert!(records[0].rsi_14.contains(','));
    }
}
