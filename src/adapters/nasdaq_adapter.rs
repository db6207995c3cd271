//! Nasdaq Data Link datatable source (e.g. `QDL/BITFINEX`).
//!
//! The full history for a code is fetched page by page, following
//! `meta.next_cursor_id` until the server stops returning one.

use crate::domain::error::MelaoError;
use crate::domain::price::RawPrice;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_source_port::PriceSource;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://data.nasdaq.com/api/v3/datatables";
pub const DEFAULT_TABLE: &str = "QDL/BITFINEX";
pub const DEFAULT_COLUMN: &str = "mid";
pub const DEFAULT_API_KEY_ENV: &str = "apikey";

#[derive(Debug, Deserialize)]
struct DatatableResponse {
    datatable: Datatable,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Datatable {
    data: Vec<Vec<Value>>,
    columns: Vec<ColumnSpec>,
}

#[derive(Debug, Deserialize)]
struct ColumnSpec {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    next_cursor_id: Option<String>,
}

pub struct NasdaqSource {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    table: String,
    column: String,
}

impl NasdaqSource {
    pub fn new(api_key: String, table: &str, column: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Reads `[source] table, column, api_key_env`; the key itself comes from
    /// the environment.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MelaoError> {
        let key_env = config
            .get_string("source", "api_key_env")
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&key_env).map_err(|_| MelaoError::ConfigInvalid {
            section: "source".into(),
            key: "api_key_env".into(),
            reason: format!("environment variable {key_env} is not set"),
        })?;

        let table = config
            .get_string("source", "table")
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        let column = config
            .get_string("source", "column")
            .unwrap_or_else(|| DEFAULT_COLUMN.to_string());

        Ok(Self::new(api_key, &table, &column))
    }

    fn fetch_page(&self, code: &str, cursor: Option<&str>) -> Result<DatatableResponse, String> {
        let url = format!("{}/{}.json", self.base_url, self.table);
        let mut query = vec![("code", code), ("api_key", self.api_key.as_str())];
        if let Some(cursor) = cursor {
            query.push(("qopts.cursor_id", cursor));
        }

        self.http
            .get(&url)
            .query(&query)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<DatatableResponse>())
            .map_err(|e| e.to_string())
    }
}

impl PriceSource for NasdaqSource {
    fn fetch(&self, code: &str) -> Result<Vec<RawPrice>, MelaoError> {
        let fetch_err = |reason: String| MelaoError::Fetch {
            code: code.to_string(),
            reason,
        };

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = self.fetch_page(code, cursor.as_deref()).map_err(fetch_err)?;
            pages += 1;
            records.extend(page_records(&page.datatable, &self.column).map_err(fetch_err)?);

            match page.meta.next_cursor_id {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(asset = code, pages, records = records.len(), "fetched datatable");
        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}

fn page_records(table: &Datatable, price_column: &str) -> Result<Vec<RawPrice>, String> {
    let position = |name: &str| table.columns.iter().position(|c| c.name == name);

    let date_idx = position("date")
        .or_else(|| position("Date"))
        .ok_or_else(|| "response has no date column".to_string())?;
    let price_idx =
        position(price_column).ok_or_else(|| format!("response has no '{price_column}' column"))?;

    Ok(table
        .data
        .iter()
        .map(|row| RawPrice {
            date: row
                .get(date_idx)
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
            price: row.get(price_idx).and_then(Value::as_f64),
        })
        .collect())
}
