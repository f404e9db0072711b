/// Twelve Data REST client for time series, quotes and market state
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::source::MarketDataSource;
use crate::data::DateRange;
use crate::error::{QuoteError, Result};
use crate::time::format_date;
use crate::types::{Config, ExchangeStatus, Quote, RawBar};

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(default)]
    values: Option<Vec<RawBar>>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(flatten)]
    status: ApiStatus,
    #[serde(flatten)]
    quote: Quote,
}

/// `/market_state` answers with a bare array, or a status object on failure
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarketStateResponse {
    Exchanges(Vec<ExchangeStatus>),
    Status(ApiStatus),
}

impl ApiStatus {
    /// `Ok(false)` for the "no data for these dates" answer returned on non-trading days
    fn check(&self) -> Result<bool> {
        if self.status.as_deref() != Some("error") {
            return Ok(true);
        }
        let message = self.message.clone().unwrap_or_default();
        if message.to_lowercase().contains("no data is available") {
            return Ok(false);
        }
        Err(QuoteError::ApiError {
            code: self.code.unwrap_or_default(),
            message,
        })
    }
}

pub(crate) fn parse_time_series(body: &str) -> Result<Vec<RawBar>> {
    let response: TimeSeriesResponse = serde_json::from_str(body)?;
    if !response.status.check()? {
        return Ok(Vec::new());
    }
    Ok(response.values.unwrap_or_default())
}

pub(crate) fn parse_quote(body: &str) -> Result<Quote> {
    let response: QuoteResponse = serde_json::from_str(body)?;
    if !response.status.check()? {
        return Err(QuoteError::MissingData("quote unavailable".to_string()));
    }
    Ok(response.quote)
}

pub(crate) fn parse_market_state(body: &str) -> Result<Option<ExchangeStatus>> {
    match serde_json::from_str(body)? {
        MarketStateResponse::Exchanges(exchanges) => Ok(exchanges.into_iter().next()),
        MarketStateResponse::Status(status) => {
            status.check()?;
            Ok(None)
        }
    }
}

pub struct TwelveDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    interval: String,
}

impl TwelveDataClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()?;

        Ok(TwelveDataClient {
            client,
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            interval: config.bar_interval.clone(),
        })
    }

    /// Intraday bars between the start of `range.start` and the end of `range.end`
    pub async fn get_time_series(&self, symbol: &str, range: DateRange) -> Result<Vec<RawBar>> {
        let start_date = format!("{} 00:00:00", format_date(range.start));
        let end_date = format!("{} 23:59:59", format_date(range.end));

        debug!("Fetching time series for {} ({} -> {})", symbol, start_date, end_date);

        let response = self
            .client
            .get(format!("{}/time_series", self.base_url))
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("symbol", symbol),
                ("interval", self.interval.as_str()),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let bars = parse_time_series(&body)?;
        debug!("Received {} bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        debug!("Fetching quote for {}", symbol);

        let response = self
            .client
            .get(format!("{}/quote", self.base_url))
            .query(&[("apikey", self.api_key.as_str()), ("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_quote(&body)
    }

    pub async fn get_market_state(&self, exchange: &str) -> Result<Option<ExchangeStatus>> {
        debug!("Fetching market state for {}", exchange);

        let response = self
            .client
            .get(format!("{}/market_state", self.base_url))
            .query(&[("apikey", self.api_key.as_str()), ("exchange", exchange)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_market_state(&body)
    }
}

impl MarketDataSource for TwelveDataClient {
    fn fetch_bars<'a>(&'a self, symbol: &'a str, range: DateRange) -> BoxFuture<'a, Result<Vec<RawBar>>> {
        Box::pin(self.get_time_series(symbol, range))
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Quote>> {
        Box::pin(self.get_quote(symbol))
    }

    fn fetch_market_status<'a>(&'a self, exchange: &'a str) -> BoxFuture<'a, Result<Option<ExchangeStatus>>> {
        Box::pin(self.get_market_state(exchange))
    }
}
