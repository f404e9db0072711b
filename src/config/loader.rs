/// Configuration loading from TOML file
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::path::Path;

use crate::error::{QuoteError, Result};
use crate::types::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| QuoteError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

/// Parse an `HH:MM` or `HH:MM:SS` session boundary
pub fn parse_market_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| QuoteError::ConfigError(format!("Invalid market time '{}': {}", value, e)))
}

pub fn parse_timezone(value: &str) -> Result<Tz> {
    value
        .parse::<Tz>()
        .map_err(|e| QuoteError::ConfigError(format!("Invalid timezone '{}': {}", value, e)))
}

pub(crate) fn validate_config(config: &Config) -> Result<()> {
    parse_timezone(&config.timezone)?;

    let open = parse_market_time(&config.market_open)?;
    let close = parse_market_time(&config.market_close)?;
    if open >= close {
        return Err(QuoteError::ConfigError(format!(
            "market_open ({}) must be before market_close ({})",
            config.market_open, config.market_close
        )));
    }

    if config.live_buffer_capacity == 0 {
        return Err(QuoteError::ConfigError("live_buffer_capacity must be >= 1".to_string()));
    }

    if config.reconnect_delay_sec == 0 {
        return Err(QuoteError::ConfigError("reconnect_delay_sec must be >= 1".to_string()));
    }

    if config.refresh_interval_sec == 0 {
        return Err(QuoteError::ConfigError("refresh_interval_sec must be >= 1".to_string()));
    }

    if config.rest_base_url.is_empty() || config.ws_url.is_empty() {
        return Err(QuoteError::ConfigError("API endpoints must not be empty".to_string()));
    }

    if config.exchange.trim().is_empty() {
        return Err(QuoteError::ConfigError("exchange must not be empty".to_string()));
    }

    Ok(())
}
