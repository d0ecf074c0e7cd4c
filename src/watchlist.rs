//! Hot-list selection for intraday runs: which tickers deserve re-polling
//! between daily bars.

use std::collections::{BTreeSet, HashMap};

use tracing::info;

use crate::config::Thresholds;
use crate::locale::parse_decimal;
use crate::types::Holding;

/// Union of (a) watched Strategic/Promising holdings and (b) Analysis rows
/// whose RSI sits in the Proximity band [warning, proximity_start). Returned
/// as an ordered set — duplicates across the two sources collapse.
pub fn select_hot_tickers(
    holdings: &[Holding],
    analysis: &[HashMap<String, String>],
    th: &Thresholds,
) -> BTreeSet<String> {
    let mut hot: BTreeSet<String> = holdings
        .iter()
        .filter(|h| h.watch && h.priority.is_hot())
        .map(|h| h.ticker.clone())
        .collect();
    info!("Priority tickers (Strategic/Promising, watched): {hot:?}");

    let prox_start = th.proximity_start();
    for row in analysis {
        let Some(rsi) = row.get("RSI_14").and_then(|v| parse_decimal(v)) else {
            continue;
        };
        if rsi >= th.warning && rsi < prox_start {
            if let Some(ticker) = row.get("Ticker").filter(|t| !t.is_empty()) {
                hot.insert(ticker.clone());
            }
        }
    }
    info!("Hot list ({} tickers): {hot:?}", hot.len());
    hot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetType, Priority};

    fn thresholds() -> Thresholds {
        Thresholds {
            warning: 35.0,
            alert: 30.0,
            proximity_pct: 15.0,
        }
    }

    fn holding(ticker: &str, priority: Priority, watch: bool) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            asset_type: AssetType::StockMoex,
            priority,
            watch,
        }
    }

    fn analysis_row(ticker: &str, rsi: &str) -> HashMap<String, String> {
        HashMap::from([
            ("Ticker".to_string(), ticker.to_string()),
            ("RSI_14".to_string(), rsi.to_string()),
        ])
    }

    #[test]
    fn includes_all_watched_priority_holdings_regardless_of_rsi() {
        let holdings = vec![
            holding("SBER", Priority::Strategic, true),
            holding("GAZP", Priority::Promising, true),
            holding("LKOH", Priority::None, true),
            holding("ROSN", Priority::Strategic, false),
        ];
        let analysis = vec![analysis_row("SBER", "75,00")];
        let hot = select_hot_tickers(&holdings, &analysis, &thresholds());

        assert!(hot.contains("SBER"));
        assert!(hot.contains("GAZP"));
        assert!(!hot.contains("LKOH"), "no priority, no proximity");
        assert!(!hot.contains("ROSN"), "priority but not watched");
    }

    #[test]
    fn includes_proximity_band_rows() {
        // band is [35.0, 40.25) for the default thresholds
        let analysis = vec![
            analysis_row("AFLT", "35,00"),
            analysis_row("MGNT", "40,00"),
            analysis_row("NVTK", "40,25"),
            analysis_row("TATN", "34,99"),
        ];
        let hot = select_hot_tickers(&[], &analysis, &thresholds());

        assert!(hot.contains("AFLT"));
        assert!(hot.contains("MGNT"));
        assert!(!hot.contains("NVTK"), "proximity_start is exclusive");
        assert!(!hot.contains("TATN"), "below warning is Warning, not Proximity");
    }

    #[test]
    fn output_is_a_set() {
        let holdings = vec![holding("SBER", Priority::Strategic, true)];
        let analysis = vec![analysis_row("SBER", "36,00")];
        let hot = select_hot_tickers(&holdings, &analysis, &thresholds());
        assert_eq!(hot.len(), 1);
    }

    #[test]
    fn unparsable_rsi_cells_are_ignored() {
        let analysis = vec![analysis_row("SBER", "N/A"), analysis_row("GAZP", "")];
        let hot = select_hot_tickers(&[], &analysis, &thresholds());
        assert!(hot.is_empty());
    }
}
