use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::Thresholds;
use crate::locale::parse_decimal;

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Holding {
    pub ticker: String,
    pub asset_type: AssetType,
    pub priority: Priority,
    pub watch: bool,
}

impl Holding {
    /// Parse one Holdings record. Rows with an unknown Type cell yield None.
    /// The Watch cell is compared case-insensitively ("TRUE"/"true"/"True").
    pub fn from_record(record: &HashMap<String, String>) -> Option<Self> {
        let ticker = record.get("Ticker")?.trim().to_string();
        if ticker.is_empty() {
            return None;
        }
        let asset_type = AssetType::parse(record.get("Type")?)?;
        let priority = Priority::parse(record.get("Priority").map(String::as_str).unwrap_or(""));
        let watch = record
            .get("Watch")
            .map(|w| w.trim().eq_ignore_ascii_case("TRUE"))
            .unwrap_or(false);
        Some(Self {
            ticker,
            asset_type,
            priority,
            watch,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    StockMoex,
    BondMoex,
    CurrencyMoex,
    CurrencyCbr,
    MacroGlobal,
}

impl AssetType {
    /// Parse the Type cell of a Holdings row. Unknown types yield None and
    /// the row is skipped with a warning.
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim() {
            "Stock_MOEX" => Some(AssetType::StockMoex),
            "Bond_MOEX" => Some(AssetType::BondMoex),
            "Currency_MOEX" => Some(AssetType::CurrencyMoex),
            "Currency_CBR" => Some(AssetType::CurrencyCbr),
            "Macro_YF" => Some(AssetType::MacroGlobal),
            _ => None,
        }
    }

    pub fn is_domestic(&self) -> bool {
        !matches!(self, AssetType::MacroGlobal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Strategic,
    Promising,
    None,
}

impl Priority {
    pub fn parse(cell: &str) -> Self {
        match cell.trim() {
            "Strategic" => Priority::Strategic,
            "Promising" => Priority::Promising,
            _ => Priority::None,
        }
    }

    pub fn is_hot(&self) -> bool {
        matches!(self, Priority::Strategic | Priority::Promising)
    }
}

// ---------------------------------------------------------------------------
// Timeframes
// ---------------------------------------------------------------------------

/// Bar granularity label stored alongside every History and Analysis row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    D1,
    H1,
    M30,
    M10,
    M1,
}

impl Timeframe {
    /// Map the CLI interval (minutes; 24 means daily) to its label.
    pub fn from_interval(interval: u32) -> Option<Self> {
        match interval {
            24 => Some(Timeframe::D1),
            60 => Some(Timeframe::H1),
            30 => Some(Timeframe::M30),
            10 => Some(Timeframe::M10),
            1 => Some(Timeframe::M1),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::D1 => "D1",
            Timeframe::H1 => "H1",
            Timeframe::M30 => "m30",
            Timeframe::M10 => "m10",
            Timeframe::M1 => "m1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// OHLCV bars
// ---------------------------------------------------------------------------

/// One normalized bar as produced by any harvester. Fields are optional
/// because providers return gaps; the analyzer drops incomplete rows.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

/// A History row parsed back out of the store, with its (ticker, timeframe)
/// context. Numeric cells that fail to parse come back as None.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub timeframe: String,
    pub ticker: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl HistoryRow {
    /// Parse one History record. Rows without a parseable date are dropped;
    /// numeric cells that fail to parse become None (treated as gaps, not
    /// errors, by the analyzer).
    pub fn from_record(record: &HashMap<String, String>) -> Option<Self> {
        let date = NaiveDate::parse_from_str(record.get("Date")?.trim(), "%Y-%m-%d").ok()?;
        let ticker = record.get("Ticker")?.trim().to_string();
        let timeframe = record.get("Timeframe")?.trim().to_string();
        if ticker.is_empty() || timeframe.is_empty() {
            return None;
        }
        let num = |key: &str| record.get(key).and_then(|v| parse_decimal(v));
        Some(Self {
            date,
            timeframe,
            ticker,
            open: num("Open"),
            high: num("High"),
            low: num("Low"),
            close: num("Close"),
            volume: num("Volume"),
        })
    }
}

// ---------------------------------------------------------------------------
// Instrument state classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Neutral,
    Proximity,
    Warning,
    Oversold,
}

impl State {
    /// Classify the latest RSI value. Evaluated in strict order, first match
    /// wins; each band is closed on its lower bound (r == alert → Warning).
    /// An undefined RSI is Neutral.
    pub fn from_rsi(rsi: Option<f64>, th: &Thresholds) -> Self {
        let Some(r) = rsi.filter(|r| r.is_finite()) else {
            return State::Neutral;
        };
        if r < th.alert {
            State::Oversold
        } else if r < th.warning {
            State::Warning
        } else if r < th.proximity_start() {
            State::Proximity
        } else {
            State::Neutral
        }
    }

    /// The Recommendation cell written next to each state. "Alert Sent" is
    /// set at analysis time, before any notification goes out — the alerter
    /// keys off it to avoid re-sending.
    pub fn recommendation(&self) -> &'static str {
        match self {
            State::Neutral => "-",
            State::Proximity => "Add to Hotlist?",
            State::Warning => "Monitor for reversal",
            State::Oversold => "Alert Sent",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            State::Neutral => "Neutral",
            State::Proximity => "Proximity",
            State::Warning => "Warning",
            State::Oversold => "Oversold",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Analysis rows
// ---------------------------------------------------------------------------

/// One row of the Analysis table. Metric cells are already locale-formatted
/// strings ("1 234,50" or "N/A") — formatting happens at this boundary so
/// the indicator math stays in plain f64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRecord {
    pub ticker: String,
    pub timeframe: String,
    pub state: State,
    pub last_update: String,
    pub rsi_14: String,
    pub ma_20: String,
    pub ma_50: String,
    pub bb_upper: String,
    pub bb_lower: String,
    pub pattern_found: String,
    pub recommendation: String,
}

impl AnalysisRecord {
    pub const HEADER: [&'static str; 11] = [
        "Ticker",
        "Timeframe",
        "State",
        "Last_Update",
        "RSI_14",
        "MA_20",
        "MA_50",
        "BB_Upper",
        "BB_Lower",
        "Pattern_Found",
        "Recommendation",
    ];

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.ticker.clone(),
            self.timeframe.clone(),
            self.state.to_string(),
            self.last_update.clone(),
            self.rsi_14.clone(),
            self.ma_20.clone(),
            self.ma_50.clone(),
            self.bb_upper.clone(),
            self.bb_lower.clone(),
            self.pattern_found.clone(),
            self.recommendation.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            warning: 35.0,
            alert: 30.0,
            proximity_pct: 15.0,
        }
    }

    #[test]
    fn oversold_below_alert() {
        assert_eq!(State::from_rsi(Some(28.0), &thresholds()), State::Oversold);
        assert_eq!(State::from_rsi(Some(0.0), &thresholds()), State::Oversold);
    }

    #[test]
    fn alert_boundary_belongs_to_warning() {
        assert_eq!(State::from_rsi(Some(30.0), &thresholds()), State::Warning);
        assert_eq!(State::from_rsi(Some(34.99), &thresholds()), State::Warning);
    }

    #[test]
    fn warning_boundary_belongs_to_proximity() {
        // proximity band is [35.0, 40.25)
        assert_eq!(State::from_rsi(Some(35.0), &thresholds()), State::Proximity);
        assert_eq!(State::from_rsi(Some(40.0), &thresholds()), State::Proximity);
    }

    #[test]
    fn proximity_start_boundary_is_neutral() {
        assert_eq!(State::from_rsi(Some(40.25), &thresholds()), State::Neutral);
        assert_eq!(State::from_rsi(Some(70.0), &thresholds()), State::Neutral);
    }

    #[test]
    fn classification_partitions_the_line() {
        let th = thresholds();
        let mut r = 0.0;
        while r <= 100.0 {
            // every value lands in exactly one band; from_rsi is total
            let _ = State::from_rsi(Some(r), &th);
            r += 0.25;
        }
    }

    #[test]
    fn undefined_rsi_is_neutral() {
        assert_eq!(State::from_rsi(None, &thresholds()), State::Neutral);
        assert_eq!(State::from_rsi(Some(f64::NAN), &thresholds()), State::Neutral);
    }

    #[test]
    fn recommendations_match_states() {
        assert_eq!(State::Oversold.recommendation(), "Alert Sent");
        assert_eq!(State::Warning.recommendation(), "Monitor for reversal");
        assert_eq!(State::Proximity.recommendation(), "Add to Hotlist?");
        assert_eq!(State::Neutral.recommendation(), "-");
    }

    #[test]
    fn timeframe_from_interval() {
        assert_eq!(Timeframe::from_interval(24), Some(Timeframe::D1));
        assert_eq!(Timeframe::from_interval(60), Some(Timeframe::H1));
        assert_eq!(Timeframe::from_interval(30), Some(Timeframe::M30));
        assert_eq!(Timeframe::from_interval(7), None);
    }

    #[test]
    fn macro_global_is_the_only_foreign_type() {
        assert!(AssetType::StockMoex.is_domestic());
        assert!(AssetType::BondMoex.is_domestic());
        assert!(AssetType::CurrencyMoex.is_domestic());
        assert!(AssetType::CurrencyCbr.is_domestic());
        assert!(!AssetType::MacroGlobal.is_domestic());
    }

    #[test]
    fn asset_type_parse() {
        assert_eq!(AssetType::parse("Stock_MOEX"), Some(AssetType::StockMoex));
        assert_eq!(AssetType::parse("Macro_YF"), Some(AssetType::MacroGlobal));
        assert_eq!(AssetType::parse("Crypto"), None);
    }
}
