/// Core type definitions for the session/quote engine
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{QuoteError, Result};

/// Historical row as returned by the time-series endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub datetime: String,
    pub close: String,
}

/// Historical price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub close: Decimal,
}

impl Bar {
    /// Parse an upstream row. Accepts `YYYY-MM-DD HH:MM:SS` and bare `YYYY-MM-DD`
    pub fn from_raw(raw: &RawBar) -> Result<Self> {
        let timestamp = NaiveDateTime::parse_from_str(raw.datetime.trim(), "%Y-%m-%d %H:%M:%S")
            .or_else(|_| {
                NaiveDate::parse_from_str(raw.datetime.trim(), "%Y-%m-%d")
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|e| {
                QuoteError::InvalidBarData(format!("bad datetime '{}': {}", raw.datetime, e))
            })?;

        let close = Decimal::from_str(raw.close.trim()).map_err(|e| {
            QuoteError::InvalidBarData(format!("bad close '{}': {}", raw.close, e))
        })?;

        Ok(Bar { timestamp, close })
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Live tick data from the push feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTick {
    pub price: Decimal,
    /// Epoch seconds
    pub timestamp: i64,
}

/// Position of "now" relative to today's session window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    BeforeOpen,
    Open,
    AfterClose,
}

impl SessionPhase {
    pub fn as_str(&self) -> &str {
        match self {
            SessionPhase::BeforeOpen => "BEFORE_OPEN",
            SessionPhase::Open => "OPEN",
            SessionPhase::AfterClose => "AFTER_CLOSE",
        }
    }
}

/// One trading day's session boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub date: NaiveDate,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

impl SessionWindow {
    pub fn open_at(&self) -> NaiveDateTime {
        self.date.and_time(self.open_time)
    }

    pub fn close_at(&self) -> NaiveDateTime {
        self.date.and_time(self.close_time)
    }
}

/// Last known closing prices. `None` is "not yet known", distinct from a zero price
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingPriceSet {
    pub closing_price: Option<Decimal>,
    pub previous_closing_price: Option<Decimal>,
}

/// Closing prices derived by one reconciliation. `None` leaves the stored value alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosingPriceUpdate {
    pub closing_price: Option<Decimal>,
    pub previous_closing_price: Option<Decimal>,
}

impl ClosingPriceUpdate {
    pub fn is_empty(&self) -> bool {
        self.closing_price.is_none() && self.previous_closing_price.is_none()
    }
}

/// Relative day a chart series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayLabel {
    Today,
    Yesterday,
    DayBeforeYesterday,
}

impl DayLabel {
    pub fn as_str(&self) -> &str {
        match self {
            DayLabel::Today => "today",
            DayLabel::Yesterday => "yesterday",
            DayLabel::DayBeforeYesterday => "day_before_yesterday",
        }
    }
}

/// Single chart point: display time plus close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: NaiveDateTime,
    pub label: String,
    pub close: Decimal,
}

/// Quote snapshot from the quote endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub previous_close: Option<String>,
}

impl Quote {
    /// Closing prices carried by the quote; unparsable fields are dropped
    pub fn closing_prices(&self) -> ClosingPriceUpdate {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| Decimal::from_str(s.trim()).ok());
        ClosingPriceUpdate {
            closing_price: parse(&self.close),
            previous_closing_price: parse(&self.previous_close),
        }
    }
}

/// Upstream exchange state from the market-state endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub is_market_open: bool,
    #[serde(default)]
    pub time_after_open: Option<String>,
    #[serde(default)]
    pub time_to_open: Option<String>,
    #[serde(default)]
    pub time_to_close: Option<String>,
}

/// Configuration for the engine
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Market Data API
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_bar_interval")]
    pub bar_interval: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    #[serde(default = "default_exchange")]
    pub exchange: String,

    // Session
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_market_open")]
    pub market_open: String,
    #[serde(default = "default_market_close")]
    pub market_close: String,

    // Live Feed
    #[serde(default = "default_reconnect_delay_sec")]
    pub reconnect_delay_sec: u64,
    #[serde(default = "default_live_buffer_capacity")]
    pub live_buffer_capacity: usize,

    // Startup
    #[serde(default)]
    pub default_symbol: Option<String>,
    #[serde(default = "default_refresh_interval_sec")]
    pub refresh_interval_sec: u64,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rest_base_url() -> String {
    "https://api.twelvedata.com".to_string()
}

fn default_ws_url() -> String {
    "wss://ws.twelvedata.com/v1/quotes/price".to_string()
}

fn default_bar_interval() -> String {
    "1min".to_string()
}

fn default_request_timeout_sec() -> u64 {
    10
}

fn default_exchange() -> String {
    "NYSE".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_market_open() -> String {
    "09:30".to_string()
}

fn default_market_close() -> String {
    "16:00".to_string()
}

fn default_reconnect_delay_sec() -> u64 {
    5
}

fn default_live_buffer_capacity() -> usize {
    10
}

fn default_refresh_interval_sec() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            rest_base_url: default_rest_base_url(),
            ws_url: default_ws_url(),
            bar_interval: default_bar_interval(),
            request_timeout_sec: default_request_timeout_sec(),
            exchange: default_exchange(),
            timezone: default_timezone(),
            market_open: default_market_open(),
            market_close: default_market_close(),
            reconnect_delay_sec: default_reconnect_delay_sec(),
            live_buffer_capacity: default_live_buffer_capacity(),
            default_symbol: None,
            refresh_interval_sec: default_refresh_interval_sec(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bar_from_raw() {
        let raw = RawBar {
            datetime: "2024-06-10 15:59:00".to_string(),
            close: "100.50000".to_string(),
        };
        let bar = Bar::from_raw(&raw).unwrap();
        assert_eq!(bar.close, dec!(100.5));
        assert_eq!(bar.date(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
    }

    #[test]
    fn test_bar_from_raw_daily_row() {
        let raw = RawBar { datetime: "2024-06-07".to_string(), close: "99".to_string() };
        let bar = Bar::from_raw(&raw).unwrap();
        assert_eq!(bar.timestamp.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_bar_from_raw_rejects_garbage() {
        let raw = RawBar { datetime: "yesterday".to_string(), close: "1".to_string() };
        assert!(matches!(Bar::from_raw(&raw), Err(QuoteError::InvalidBarData(_))));

        let raw = RawBar { datetime: "2024-06-10 09:30:00".to_string(), close: "n/a".to_string() };
        assert!(Bar::from_raw(&raw).is_err());
    }

    #[test]
    fn test_quote_closing_prices_skip_unparsable() {
        let quote = Quote {
            symbol: Some("AAPL".to_string()),
            close: Some("191.25".to_string()),
            previous_close: Some("".to_string()),
        };
        let update = quote.closing_prices();
        assert_eq!(update.closing_price, Some(dec!(191.25)));
        assert_eq!(update.previous_closing_price, None);
    }

    #[test]
    fn test_zero_price_is_not_unset() {
        let quote = Quote { symbol: None, close: Some("0".to_string()), previous_close: None };
        assert_eq!(quote.closing_prices().closing_price, Some(Decimal::ZERO));
    }
}
