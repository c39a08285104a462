//! FinMind bulk quote client.
//!
//! Fetches daily closes from the FinMind v4 data API, which serves both
//! request shapes the scheduler plans with: one instrument over an open-ended
//! range, or the whole market over a date range. Handles retry with
//! exponential backoff, status-code triage, and the quota breaker.
//!
//! An account token raises the hourly request quota and unlocks the
//! whole-market dataset; unauthenticated requests are accepted but may be
//! silently truncated upstream.

use super::breaker::QuotaBreaker;
use super::provider::{FetchError, MarketDataSource};
use crate::domain::PriceObservation;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.finmindtrade.com/api/v4";
const DAILY_PRICE_DATASET: &str = "TaiwanStockPrice";

/// FinMind v4 data API envelope.
#[derive(Debug, Deserialize)]
struct DataResponse {
    #[serde(default)]
    msg: String,
    status: i64,
    #[serde(default)]
    data: Vec<DailyPriceRow>,
}

/// One row of the daily price dataset. The API returns full OHLCV; only the
/// fields the breadth pipeline consumes are kept.
#[derive(Debug, Deserialize)]
struct DailyPriceRow {
    date: String,
    stock_id: String,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    status: i64,
    #[serde(default)]
    msg: String,
}

/// Blocking HTTP source against the FinMind quote API.
pub struct FinMindSource {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Mutex<Option<String>>,
    breaker: Arc<QuotaBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl FinMindSource {
    pub fn new(breaker: Arc<QuotaBreaker>) -> Self {
        Self::with_base_url(breaker, DEFAULT_BASE_URL)
    }

    /// Construct against a non-default endpoint (test doubles, mirrors).
    pub fn with_base_url(breaker: Arc<QuotaBreaker>, base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            token: Mutex::new(None),
            breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    /// Parse the data envelope into observations. `unit` labels the request
    /// in error messages.
    fn parse_response(unit: &str, resp: DataResponse) -> Result<Vec<PriceObservation>, FetchError> {
        if resp.status != 200 {
            return Err(FetchError::MalformedPayload(format!(
                "{unit}: upstream status {} ({})",
                resp.status, resp.msg
            )));
        }

        let mut observations = Vec::with_capacity(resp.data.len());
        for row in resp.data {
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                FetchError::MalformedPayload(format!("{unit}: bad date '{}': {e}", row.date))
            })?;
            // Zero closes appear on suspended instruments; not a price.
            if !row.close.is_finite() || row.close <= 0.0 {
                continue;
            }
            observations.push(PriceObservation {
                date,
                instrument: row.stock_id,
                close: row.close,
            });
        }

        Ok(observations)
    }

    /// Execute one data request with retry and breaker logic.
    fn request_dataset(
        &self,
        unit: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<PriceObservation>, FetchError> {
        if !self.breaker.is_allowed() {
            return Err(FetchError::Blocked);
        }

        let url = format!("{}/data", self.base_url);
        let mut params: Vec<(&str, String)> = vec![("dataset", DAILY_PRICE_DATASET.to_string())];
        params.extend_from_slice(query);
        if let Some(token) = self.current_token() {
            params.push(("token", token));
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.breaker.is_allowed() {
                return Err(FetchError::Blocked);
            }

            match self.client.get(&url).query(&params).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
                        // Hourly quota exhausted upstream
                        self.breaker.open();
                        return Err(FetchError::Blocked);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(FetchError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(FetchError::AuthRejected(format!(
                            "upstream refused {unit} with HTTP {status}"
                        )));
                    }

                    if !status.is_success() {
                        self.breaker.record_failure();
                        last_error = Some(FetchError::Other(format!("HTTP {status} for {unit}")));
                        continue;
                    }

                    let envelope: DataResponse = resp.json().map_err(|e| {
                        FetchError::MalformedPayload(format!("{unit}: {e}"))
                    })?;

                    let observations = Self::parse_response(unit, envelope)?;
                    self.breaker.record_success();
                    return Ok(observations);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

impl MarketDataSource for FinMindSource {
    fn name(&self) -> &str {
        "finmind"
    }

    fn authenticate(&self, token: &str) -> Result<(), FetchError> {
        let url = format!("{}/user_info", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("token", token)])
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthRejected("token rejected by upstream".into()));
        }
        if !resp.status().is_success() {
            return Err(FetchError::Other(format!(
                "login handshake failed with HTTP {}",
                resp.status()
            )));
        }

        let info: UserInfoResponse = resp
            .json()
            .map_err(|e| FetchError::MalformedPayload(format!("user_info: {e}")))?;
        if info.status != 200 {
            return Err(FetchError::AuthRejected(format!(
                "login handshake returned status {} ({})",
                info.status, info.msg
            )));
        }

        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn fetch_instrument(
        &self,
        instrument: &str,
        start: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError> {
        let query = [
            ("data_id", instrument.to_string()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
        ];
        let observations = self.request_dataset(instrument, &query)?;
        if observations.is_empty() {
            return Err(FetchError::InstrumentNotFound {
                instrument: instrument.to_string(),
            });
        }
        Ok(observations)
    }

    fn fetch_market(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>, FetchError> {
        let unit = format!("market {start}..{end}");
        let query = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];
        self.request_dataset(&unit, &query)
    }

    fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }
}
