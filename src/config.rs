use std::collections::HashMap;

use crate::locale::parse_decimal;

pub const STORE_API_URL: &str = "https://sheets.googleapis.com";
pub const MOEX_ISS_URL: &str = "https://iss.moex.com";
pub const CBR_XML_URL: &str = "http://www.cbr.ru/scripts/XML_dynamic.asp";
pub const GLOBAL_CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Store table names. History is append-only; Analysis is rewritten whole.
pub const HOLDINGS_TABLE: &str = "Holdings";
pub const CONFIG_TABLE: &str = "Config";
pub const HISTORY_TABLE: &str = "History_OHLCV";
pub const ANALYSIS_TABLE: &str = "Analysis";

/// Wide lookback when a ticker has no prior history (2 years).
pub const FULL_LOOKBACK_DAYS: i64 = 730;

/// Delta window for the global feed — a few days of overlap is cheaper
/// than computing a per-ticker resume point against the remote store.
pub const GLOBAL_DELTA_LOOKBACK_DAYS: i64 = 7;

/// Global feed retry backoff per attempt (milliseconds), on 429/5xx.
pub const GLOBAL_RETRY_BACKOFF_MS: &[u64] = &[1_000, 2_000, 4_000];

/// Pacing delay between global-feed tickers to respect provider rate limits.
pub const GLOBAL_PACING_MS: u64 = 1_000;

pub const STORE_TIMEOUT_SECS: u64 = 30;
pub const FEED_TIMEOUT_SECS: u64 = 15;
pub const GLOBAL_FEED_TIMEOUT_SECS: u64 = 60;
pub const TELEGRAM_TIMEOUT_SECS: u64 = 10;

/// The global chart feed rejects default library user agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/108.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Config {
    pub store_api_url: String,
    pub moex_iss_url: String,
    pub cbr_xml_url: String,
    pub global_chart_url: String,
    pub telegram_api_url: String,
    pub log_level: String,
    /// Path to the service-account key file for the store.
    pub credentials_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            store_api_url: std::env::var("STORE_API_URL")
                .unwrap_or_else(|_| STORE_API_URL.to_string()),
            moex_iss_url: std::env::var("MOEX_ISS_URL")
                .unwrap_or_else(|_| MOEX_ISS_URL.to_string()),
            cbr_xml_url: std::env::var("CBR_XML_URL").unwrap_or_else(|_| CBR_XML_URL.to_string()),
            global_chart_url: std::env::var("GLOBAL_CHART_URL")
                .unwrap_or_else(|_| GLOBAL_CHART_URL.to_string()),
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            credentials_path: std::env::var("STORE_CREDENTIALS")
                .unwrap_or_else(|_| "credentials.json".to_string()),
        }
    }
}

/// RSI classification thresholds, read from the store's Config table.
/// Cell values are human-edited and may use comma decimal separators.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub warning: f64,
    pub alert: f64,
    pub proximity_pct: f64,
}

impl Thresholds {
    pub fn from_table(config: &HashMap<String, String>) -> Self {
        Self {
            warning: lookup(config, "RSI_WARNING_LEVEL", 35.0),
            alert: lookup(config, "RSI_ALERT_LEVEL", 30.0),
            proximity_pct: lookup(config, "PROXIMITY_PERCENTAGE", 15.0),
        }
    }

    /// Upper bound of the Proximity band: warning × (1 + pct/100).
    pub fn proximity_start(&self) -> f64 {
        self.warning * (1.0 + self.proximity_pct / 100.0)
    }
}

fn lookup(config: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    config
        .get(key)
        .and_then(|v| parse_decimal(v))
        .unwrap_or(default)
}
