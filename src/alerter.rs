//! Threshold alert dispatcher: scans Analysis for newly Oversold rows and
//! posts one Telegram message per row.
//!
//! Eligibility comes from the table alone — State "Oversold" with a
//! Recommendation other than "Alert Sent". The analyzer writes "Alert Sent"
//! pre-emptively at classification time, so the flag means "eligible at
//! analysis time", not "delivered". Dispatch is fire-and-forget per row.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::{Config, ANALYSIS_TABLE, CONFIG_TABLE, TELEGRAM_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::locale::parse_decimal;
use crate::store::StoreClient;
use crate::types::Timeframe;

const MARKDOWN_V2_RESERVED: &str = r"_*[]()~`>#+-=|{}.!";

/// Escape MarkdownV2 reserved characters for safe interpolation.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Rows eligible for dispatch on this run's timeframe.
pub fn select_alerts<'a>(
    analysis: &'a [HashMap<String, String>],
    timeframe: &str,
) -> Vec<&'a HashMap<String, String>> {
    analysis
        .iter()
        .filter(|row| {
            row.get("Timeframe").map(String::as_str) == Some(timeframe)
                && row.get("State").map(String::as_str) == Some("Oversold")
                && row.get("Recommendation").map(String::as_str) != Some("Alert Sent")
        })
        .collect()
}

pub fn build_message(ticker: &str, rsi: f64, timeframe: &str, timestamp: &str) -> String {
    let safe_ticker = escape_markdown(ticker);
    format!(
        "🚨 *OVERSOLD SIGNAL \\({timeframe}\\)*\n\n\
         *{safe_ticker}* entered the oversold zone\n\n\
         *Current RSI\\(14\\):* `{rsi:.2}`\n\
         *Signal time:* `{timestamp}`\n\n\
         *Recommendation:* look for an entry point on the {timeframe} timeframe\\."
    )
}

/// The alerter stage. Send failures are logged per row and never block the
/// remaining rows; there is no retry queue.
pub async fn run_alerter(cfg: &Config, store: &StoreClient, timeframe: Timeframe) -> Result<()> {
    info!("--- Alerter (timeframe {timeframe}) ---");

    let config = store.read_config(CONFIG_TABLE).await?;
    let analysis = store.read_records(ANALYSIS_TABLE).await?;
    if analysis.is_empty() {
        info!("{ANALYSIS_TABLE} is empty — nothing to dispatch.");
        return Ok(());
    }

    let alerts = select_alerts(&analysis, timeframe.label());
    if alerts.is_empty() {
        info!("No new Oversold signals for {timeframe}.");
        return Ok(());
    }
    info!("Found {} new Oversold signals, dispatching...", alerts.len());

    let (Some(token), Some(chat_id)) = (
        config.get("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()),
        config.get("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()),
    ) else {
        // Signals stay eligible in the table, but the analyzer will flip
        // them to "Alert Sent" on its next run regardless.
        error!("Telegram credentials missing from Config — {} alerts not sent.", alerts.len());
        return Ok(());
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(TELEGRAM_TIMEOUT_SECS))
        .build()?;

    for row in alerts {
        let ticker = row.get("Ticker").cloned().unwrap_or_default();
        let Some(rsi) = row.get("RSI_14").and_then(|v| parse_decimal(v)) else {
            warn!("    - {ticker}: RSI cell not numeric, skipping alert");
            continue;
        };
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let message = build_message(&ticker, rsi, timeframe.label(), &timestamp);

        match send_telegram(&http, &cfg.telegram_api_url, token, chat_id, &message).await {
            Ok(()) => info!("    - alert for {ticker} dispatched"),
            Err(e) => error!("    - alert for {ticker} failed: {e} — continuing"),
        }
    }
    Ok(())
}

async fn send_telegram(
    http: &reqwest::Client,
    base_url: &str,
    token: &str,
    chat_id: &str,
    text: &str,
) -> Result<()> {
    let url = format!("{base_url}/bot{token}/sendMessage");
    let resp = http
        .post(&url)
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
        }))
        .send()
        .await?;
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::Notify(format!(
        "sendMessage returned {status}: {body}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ticker: &str, timeframe: &str, state: &str, recommendation: &str) -> HashMap<String, String> {
        HashMap::from([
            ("Ticker".to_string(), ticker.to_string()),
            ("Timeframe".to_string(), timeframe.to_string()),
            ("State".to_string(), state.to_string()),
            ("Recommendation".to_string(), recommendation.to_string()),
            ("RSI_14".to_string(), "28,00".to_string()),
        ])
    }

    #[test]
    fn escapes_every_reserved_character() {
        let input = "_*[]()~`>#+-=|{}.!";
        let escaped = escape_markdown(input);
        assert_eq!(
            escaped,
            r"\_\*\[\]\(\)\~\`\>\#\+\-\=\|\{\}\.\!"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(escape_markdown("SBER"), "SBER");
        assert_eq!(escape_markdown("USD/RUB"), "USD/RUB");
    }

    #[test]
    fn selects_only_unsent_oversold_rows_for_timeframe() {
        let analysis = vec![
            row("ABC", "D1", "Oversold", "-"),
            row("SENT", "D1", "Oversold", "Alert Sent"),
            row("WARN", "D1", "Warning", "Monitor for reversal"),
            row("HOUR", "H1", "Oversold", "-"),
        ];
        let selected = select_alerts(&analysis, "D1");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0]["Ticker"], "ABC");
    }

    #[test]
    fn never_reselects_already_sent_rows() {
        let analysis = vec![row("ABC", "D1", "Oversold", "Alert Sent")];
        assert!(select_alerts(&analysis, "D1").is_empty());
    }

    #[test]
    fn message_embeds_escaped_ticker_and_two_decimal_rsi() {
        let msg = build_message("USD/RUB", 28.456, "D1", "2024-03-10 09:30:00");
        assert!(msg.contains("USD/RUB"));
        assert!(msg.contains("`28.46`"));
        assert!(msg.contains("2024-03-10 09:30:00"));
        assert!(msg.contains("D1"));
    }
}
