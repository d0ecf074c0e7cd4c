//! Client for the spreadsheet-backed store. Four tables live in one shared
//! spreadsheet (Holdings, Config, History_OHLCV, Analysis); access goes
//! through the values API with a service-account key loaded from disk.
//!
//! This is a thin wrapper: no retries, no caching. Table semantics (append
//! vs. full overwrite) are the caller's contract.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::{Config, STORE_TIMEOUT_SECS};
use crate::error::{AppError, Result};

/// Service-account key file contents. The exocortex id is only needed by
/// the session-log appender binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub spreadsheet_id: String,
    pub token: String,
    #[serde(default)]
    pub exocortex_spreadsheet_id: Option<String>,
}

impl Credentials {
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Credentials(format!("cannot read key file '{path}': {e}"))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Credentials(format!("key file '{path}' is not a valid key: {e}"))
        })
    }
}

pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
}

impl StoreClient {
    /// Open the main store. Fails fast on a missing or malformed key file —
    /// no stage runs without store access.
    pub fn open(cfg: &Config) -> Result<Self> {
        let creds = Credentials::load(&cfg.credentials_path)?;
        let id = creds.spreadsheet_id.clone();
        Self::open_spreadsheet(cfg, &creds, id)
    }

    /// Open a specific spreadsheet with already-loaded credentials (used by
    /// the exocortex binary for its separate knowledge spreadsheet).
    pub fn open_spreadsheet(
        cfg: &Config,
        creds: &Credentials,
        spreadsheet_id: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(STORE_TIMEOUT_SECS))
            .build()?;
        info!("Store client ready (spreadsheet {spreadsheet_id})");
        Ok(Self {
            http,
            base_url: cfg.store_api_url.clone(),
            spreadsheet_id,
            token: creds.token.clone(),
        })
    }

    /// Read a whole table as records: first row is the header, every other
    /// row becomes a name → cell map. Short rows are padded with empties.
    pub async fn read_records(&self, table: &str) -> Result<Vec<HashMap<String, String>>> {
        let values = self.get_values(table).await?;
        Ok(records_from_values(&values))
    }

    /// Read the Config table into a Parameter → Value map.
    pub async fn read_config(&self, table: &str) -> Result<HashMap<String, String>> {
        let records = self.read_records(table).await?;
        Ok(records
            .into_iter()
            .filter_map(|mut r| {
                let param = r.remove("Parameter")?;
                let value = r.remove("Value")?;
                Some((param, value))
            })
            .collect())
    }

    /// Append rows to the end of a table (the History contract).
    pub async fn append_rows(&self, table: &str, rows: &[Vec<String>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base_url, self.spreadsheet_id, table
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        check_status(table, resp).await
    }

    /// Replace a table wholesale: clear, then write header + rows in one
    /// update (the Analysis contract).
    pub async fn overwrite(
        &self,
        table: &str,
        header: &[&str],
        rows: &[Vec<String>],
    ) -> Result<()> {
        let clear_url = format!(
            "{}/v4/spreadsheets/{}/values/{}:clear",
            self.base_url, self.spreadsheet_id, table
        );
        let resp = self
            .http
            .post(&clear_url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await?;
        check_status(table, resp).await?;

        let mut values: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        values.push(header.iter().map(|h| h.to_string()).collect());
        values.extend(rows.iter().cloned());

        let update_url = format!(
            "{}/v4/spreadsheets/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url, self.spreadsheet_id, table
        );
        let resp = self
            .http
            .put(&update_url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        check_status(table, resp).await
    }

    async fn get_values(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, table
        );
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Store(format!(
                "reading table '{table}' failed with status {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        let rows = body
            .get("values")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(cell_to_string).collect())
                    .unwrap_or_default()
            })
            .collect())
    }
}

async fn check_status(table: &str, resp: reqwest::Response) -> Result<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::Store(format!(
        "writing table '{table}' failed with status {status}: {body}"
    )))
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Zip a raw values grid into header-keyed records.
pub fn records_from_values(values: &[Vec<String>]) -> Vec<HashMap<String, String>> {
    let Some((header, rows)) = values.split_first() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn records_zip_header_with_rows() {
        let values = grid(&[
            &["Ticker", "Type", "Watch"],
            &["SBER", "Stock_MOEX", "TRUE"],
            &["USD/RUB", "Currency_CBR", "FALSE"],
        ]);
        let records = records_from_values(&values);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Ticker"], "SBER");
        assert_eq!(records[1]["Type"], "Currency_CBR");
    }

    #[test]
    fn short_rows_pad_with_empty_cells() {
        let values = grid(&[&["Ticker", "Type"], &["SBER"]]);
        let records = records_from_values(&values);
        assert_eq!(records[0]["Type"], "");
    }

    #[test]
    fn empty_table_yields_no_records() {
        assert!(records_from_values(&[]).is_empty());
        assert!(records_from_values(&grid(&[&["Ticker"]])).is_empty());
    }
}
