//! MOEX ISS history harvester for domestic equities, bonds and exchange FX.
//!
//! The ISS history endpoint returns a column-list + data-array payload under
//! the "history" key. An empty data array is normal (non-trading day, new
//! listing) and yields an empty bar list, not an error.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{AssetType, OhlcvBar};

/// Engine / market / board triple for the ISS URL path.
pub fn market_board(asset_type: AssetType) -> Option<(&'static str, &'static str, &'static str)> {
    match asset_type {
        AssetType::StockMoex => Some(("stock", "shares", "TQBR")),
        AssetType::BondMoex => Some(("stock", "bonds", "TQOB")),
        AssetType::CurrencyMoex => Some(("currency", "selt", "CETS")),
        AssetType::CurrencyCbr | AssetType::MacroGlobal => None,
    }
}

pub async fn fetch_history(
    http: &reqwest::Client,
    base_url: &str,
    ticker: &str,
    asset_type: AssetType,
    start: NaiveDate,
    interval: u32,
) -> Result<Vec<OhlcvBar>> {
    let Some((engine, market, board)) = market_board(asset_type) else {
        warn!("    - {ticker} is not a MOEX asset type, skipping");
        return Ok(Vec::new());
    };
    info!("  - MOEX history for {ticker} ({engine}/{market}/{board}) from {start}, interval {interval}");

    let url = format!(
        "{base_url}/iss/history/engines/{engine}/markets/{market}/boards/{board}\
         /securities/{ticker}.json?from={start}&interval={interval}&iss.meta=off"
    );
    let payload: Value = http.get(&url).send().await?.error_for_status()?.json().await?;
    Ok(parse_history(&payload))
}

/// Parse the "history" block: a "columns" name list plus rows of cells.
/// Column names are mapped to the common schema; unknown columns are ignored.
pub fn parse_history(payload: &Value) -> Vec<OhlcvBar> {
    let history = payload.get("history").unwrap_or(&Value::Null);
    let columns: Vec<&str> = history
        .get("columns")
        .and_then(|c| c.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    let rows = history
        .get("data")
        .and_then(|d| d.as_array())
        .cloned()
        .unwrap_or_default();

    let col = |name: &str| columns.iter().position(|c| *c == name);
    let date_idx = col("TRADEDATE");
    let open_idx = col("OPEN");
    let high_idx = col("HIGH");
    let low_idx = col("LOW");
    let close_idx = col("CLOSE");
    // Currency boards report turnover as VOLRUR instead of VOLUME.
    let volume_idx = col("VOLUME").or_else(|| col("VOLRUR"));

    let Some(date_idx) = date_idx else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| {
            let cells = row.as_array()?;
            let date_cell = cells.get(date_idx)?.as_str()?;
            let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d").ok()?;
            let num = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).and_then(Value::as_f64);
            Some(OhlcvBar {
                date,
                open: num(open_idx),
                high: num(high_idx),
                low: num(low_idx),
                close: num(close_idx),
                volume: num(volume_idx),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iss_history_payload() {
        let payload: Value = serde_json::from_str(
            r#"{
                "history": {
                    "columns": ["BOARDID", "TRADEDATE", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"],
                    "data": [
                        ["TQBR", "2024-03-01", 295.5, 301.0, 294.2, 300.1, 12345678],
                        ["TQBR", "2024-03-04", 300.5, 305.0, 299.0, 304.4, 9876543]
                    ]
                }
            }"#,
        )
        .unwrap();
        let bars = parse_history(&payload);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(bars[0].close, Some(300.1));
        assert_eq!(bars[1].volume, Some(9876543.0));
    }

    #[test]
    fn currency_volume_comes_from_volrur() {
        let payload: Value = serde_json::from_str(
            r#"{
                "history": {
                    "columns": ["TRADEDATE", "OPEN", "HIGH", "LOW", "CLOSE", "VOLRUR"],
                    "data": [["2024-03-01", 90.1, 91.0, 89.9, 90.5, 5000000]]
                }
            }"#,
        )
        .unwrap();
        let bars = parse_history(&payload);
        assert_eq!(bars[0].volume, Some(5000000.0));
    }

    #[test]
    fn empty_data_yields_empty_bars() {
        let payload: Value =
            serde_json::from_str(r#"{"history": {"columns": ["TRADEDATE"], "data": []}}"#)
                .unwrap();
        assert!(parse_history(&payload).is_empty());
    }

    #[test]
    fn null_cells_become_gaps() {
        let payload: Value = serde_json::from_str(
            r#"{
                "history": {
                    "columns": ["TRADEDATE", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"],
                    "data": [["2024-03-01", null, null, null, 100.0, null]]
                }
            }"#,
        )
        .unwrap();
        let bars = parse_history(&payload);
        assert_eq!(bars[0].open, None);
        assert_eq!(bars[0].close, Some(100.0));
    }

    #[test]
    fn board_routing_by_asset_type() {
        assert_eq!(
            market_board(AssetType::StockMoex),
            Some(("stock", "shares", "TQBR"))
        );
        assert_eq!(
            market_board(AssetType::BondMoex),
            Some(("stock", "bonds", "TQOB"))
        );
        assert_eq!(
            market_board(AssetType::CurrencyMoex),
            Some(("currency", "selt", "CETS"))
        );
        assert_eq!(market_board(AssetType::CurrencyCbr), None);
    }
}
