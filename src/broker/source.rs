/// Upstream market data boundary
use futures_util::future::BoxFuture;

use crate::data::DateRange;
use crate::error::Result;
use crate::types::{ExchangeStatus, Quote, RawBar};

/// Request functions the engine depends on. "No data" must be an empty
/// sequence, not an error.
pub trait MarketDataSource: Send + Sync {
    fn fetch_bars<'a>(&'a self, symbol: &'a str, range: DateRange) -> BoxFuture<'a, Result<Vec<RawBar>>>;

    fn fetch_quote<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Quote>>;

    /// `Ok(None)` when the exchange reports nothing
    fn fetch_market_status<'a>(&'a self, exchange: &'a str) -> BoxFuture<'a, Result<Option<ExchangeStatus>>>;
}
