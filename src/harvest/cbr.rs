//! Central-bank FX fixing harvester.
//!
//! The CBR publishes one fixing per currency per day as an XML time series.
//! Each fixing becomes a bar with Open=High=Low=Close and Volume=0 — there
//! is no traded volume behind an official fixing.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::locale::parse_decimal;
use crate::types::OhlcvBar;

/// CBR internal ids for the currency pairs we track.
pub fn currency_code(ticker: &str) -> Option<&'static str> {
    match ticker {
        "USD/RUB" => Some("R01235"),
        "EUR/RUB" => Some("R01239"),
        "CNY/RUB" => Some("R01375"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "Record", default)]
    records: Vec<FixingRecord>,
}

#[derive(Debug, Deserialize)]
struct FixingRecord {
    #[serde(rename = "@Date")]
    date: String,
    #[serde(rename = "Value")]
    value: String,
}

pub async fn fetch_history(
    http: &reqwest::Client,
    base_url: &str,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<OhlcvBar>> {
    let Some(code) = currency_code(ticker) else {
        warn!("    - unknown central-bank currency pair '{ticker}', skipping");
        return Ok(Vec::new());
    };
    info!("  - CBR fixings for {ticker} ({code}) from {start}");

    let url = format!(
        "{base_url}?date_req1={}&date_req2={}&VAL_NM_RQ={code}",
        start.format("%d/%m/%Y"),
        end.format("%d/%m/%Y"),
    );
    let body = http.get(&url).send().await?.error_for_status()?.text().await?;
    parse_fixings(&body)
}

/// Parse the XML series. Dates are dd.mm.yyyy and values use comma decimals.
pub fn parse_fixings(xml: &str) -> Result<Vec<OhlcvBar>> {
    let series: ValCurs = quick_xml::de::from_str(xml)?;
    Ok(series
        .records
        .iter()
        .filter_map(|record| {
            let date = NaiveDate::parse_from_str(&record.date, "%d.%m.%Y").ok()?;
            let fixing = parse_decimal(&record.value)?;
            Some(OhlcvBar {
                date,
                open: Some(fixing),
                high: Some(fixing),
                low: Some(fixing),
                close: Some(fixing),
                volume: Some(0.0),
            })
        })
        .collect())
}
