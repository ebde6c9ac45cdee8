// src/connectors/comtrade.rs
//
// UN Comtrade legacy API client. One GET per (reporter, year) returns a CSV
// of annual HS import flows from every partner.

use crate::error::FetchError;
use crate::models::{CommodityCode, ComtradeRow, CountryCode, TradeFlowRecord, Year};
use crate::traits::TradeFlowSource;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

pub const DEFAULT_COMTRADE_URL: &str = "http://comtrade.un.org/api/get";
pub const DEFAULT_MAX_RECORDS: u32 = 50_000;

/// Trade-flow source backed by the Comtrade HTTP API.
///
/// Makes exactly one attempt per call; wrap it in a
/// [`RetryingSource`](super::retry::RetryingSource) for backoff.
pub struct ComtradeClient {
    http_client: reqwest::Client,
    base_url: Url,
    max_records: u32,
}

impl ComtradeClient {
    pub fn new(base_url: &str, max_records: u32, timeout: Duration) -> Result<Self, String> {
        let base_url = Url::parse(base_url).map_err(|e| format!("Invalid Comtrade URL {}: {}", base_url, e))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            http_client,
            base_url,
            max_records,
        })
    }

    /// Builds the import query for one reporter and year.
    pub fn import_url(&self, reporter: CountryCode, year: Year, commodities: &[CommodityCode]) -> Url {
        let commodity_list = commodities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("max", &self.max_records.to_string())
            .append_pair("type", "C")
            .append_pair("freq", "A")
            .append_pair("px", "HS")
            .append_pair("ps", &year.to_string())
            .append_pair("r", &reporter.to_string())
            .append_pair("p", "all")
            .append_pair("rg", "1")
            .append_pair("cc", &commodity_list)
            .append_pair("fmt", "CSV");
        url
    }
}

#[async_trait]
impl TradeFlowSource for ComtradeClient {
    async fn fetch_imports(
        &self,
        reporter: CountryCode,
        year: Year,
        commodities: &[CommodityCode],
    ) -> Result<Vec<TradeFlowRecord>, FetchError> {
        let url = self.import_url(reporter, year, commodities);
        debug!("Comtrade: GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let records = parse_import_csv(&body)?;

        info!(
            "Comtrade: {} import rows for reporter {} in {}",
            records.len(),
            reporter,
            year
        );
        Ok(records)
    }
}

/// Parses a Comtrade CSV body into flow records.
pub fn parse_import_csv(body: &str) -> Result<Vec<TradeFlowRecord>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<ComtradeRow>() {
        let row = row.map_err(|e| FetchError::Permanent(format!("Failed to parse Comtrade CSV: {}", e)))?;
        records.push(TradeFlowRecord::from(row));
    }
    Ok(records)
}

/// Connection resets, timeouts and truncated bodies are worth another try.
fn classify_transport_error(e: reqwest::Error) -> FetchError {
    if let Some(status) = e.status() {
        return classify_status(status);
    }
    if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
        FetchError::Transient(format!("HTTP request failed: {}", e))
    } else {
        FetchError::Permanent(format!("HTTP request failed: {}", e))
    }
}

fn classify_status(status: StatusCode) -> FetchError {
    let message = format!("API returned status: {}", status);
    if is_transient_status(status) {
        FetchError::Transient(message)
    } else {
        FetchError::Permanent(message)
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}
