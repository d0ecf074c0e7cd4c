//! Global equity/macro feed harvester (Yahoo-style v8 chart API).
//!
//! The provider throttles aggressively and rejects default library user
//! agents, so requests carry a browser User-Agent and retry up to three
//! times with exponential backoff on 429/5xx. Delta runs fetch a short
//! overlapping window; full runs fetch the entire two-year lookback.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::warn;

use crate::config::GLOBAL_RETRY_BACKOFF_MS;
use crate::error::{AppError, Result};
use crate::types::OhlcvBar;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

/// Field names are matched case-insensitively via aliases — the provider has
/// changed casing before without notice.
#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(alias = "Open")]
    open: Vec<Option<f64>>,
    #[serde(alias = "High")]
    high: Vec<Option<f64>>,
    #[serde(alias = "Low")]
    low: Vec<Option<f64>>,
    #[serde(alias = "Close")]
    close: Vec<Option<f64>>,
    #[serde(alias = "Volume")]
    volume: Vec<Option<u64>>,
}

fn chart_url(base_url: &str, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
    let period1 = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
    let period2 = end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
    format!("{base_url}/{ticker}?period1={period1}&period2={period2}&interval=1d")
}

pub async fn fetch_history(
    http: &reqwest::Client,
    base_url: &str,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<OhlcvBar>> {
    let url = chart_url(base_url, ticker, start, end);

    let mut last_error = None;
    for (attempt, &delay_ms) in GLOBAL_RETRY_BACKOFF_MS.iter().enumerate() {
        match http.get(&url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(
                        "    - global feed returned {status} for {ticker} \
                         (attempt {}), backing off {delay_ms}ms",
                        attempt + 1
                    );
                    last_error = Some(AppError::Feed(format!(
                        "global feed status {status} for {ticker}"
                    )));
                } else {
                    let payload: ChartResponse = resp.error_for_status()?.json().await?;
                    return parse_chart(ticker, payload);
                }
            }
            Err(e) => {
                warn!(
                    "    - global feed transport error for {ticker} \
                     (attempt {}): {e}, backing off {delay_ms}ms",
                    attempt + 1
                );
                last_error = Some(AppError::Http(e));
            }
        }
        if attempt + 1 < GLOBAL_RETRY_BACKOFF_MS.len() {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        AppError::Feed(format!("global feed exhausted retries for {ticker}"))
    }))
}

/// Zip timestamps with the quote arrays. Entries where every field is null
/// (holiday padding) are dropped.
pub fn parse_chart(ticker: &str, resp: ChartResponse) -> Result<Vec<OhlcvBar>> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) => AppError::Feed(format!(
            "global feed error for {ticker}: {}: {}",
            err.code, err.description
        )),
        None => AppError::Feed(format!("global feed returned no result for {ticker}")),
    })?;
    let Some(data) = result.into_iter().next() else {
        return Ok(Vec::new());
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc().date()) else {
            continue;
        };
        let bar = OhlcvBar {
            date,
            open: quote.open.get(i).copied().flatten(),
            high: quote.high.get(i).copied().flatten(),
            low: quote.low.get(i).copied().flatten(),
            close: quote.close.get(i).copied().flatten(),
            volume: quote.volume.get(i).copied().flatten().map(|v| v as f64),
        };
        if bar.open.is_none() && bar.close.is_none() {
            continue;
        }
        bars.push(bar);
    }
    Ok(bars)
}
