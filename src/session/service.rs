/// Session orchestration: resolves which sessions matter now, fetches and
/// reconciles their bars, and writes derived prices into the store
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::broker::MarketDataSource;
use crate::config::parse_timezone;
use crate::data::{plan_fetch, reconcile, DateRange, Reconciliation, ReconciliationCase, SessionStore};
use crate::error::{QuoteError, Result};
use crate::time::{last_trading_day_from, SessionClock, TradingCalendar};
use crate::types::{Bar, ClosingPriceSet, Config, ExchangeStatus, SessionPhase};

/// Snapshot of where "now" sits in the trading week
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketStatus {
    pub today: NaiveDate,
    pub last_trading_day: NaiveDate,
    pub case: ReconciliationCase,
    pub phase: SessionPhase,
    pub market_open: bool,
    pub before_market: bool,
    pub after_market: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestTicket {
    symbol: String,
    generation: u64,
}

#[derive(Debug, Default)]
struct Selection {
    symbol: Option<String>,
    generation: u64,
}

pub struct SessionService {
    source: Arc<dyn MarketDataSource>,
    store: SessionStore,
    calendar: TradingCalendar,
    clock: SessionClock,
    selection: Mutex<Selection>,
}

impl SessionService {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: SessionStore,
        calendar: TradingCalendar,
        clock: SessionClock,
    ) -> Self {
        SessionService {
            source,
            store,
            calendar,
            clock,
            selection: Mutex::new(Selection::default()),
        }
    }

    pub fn from_config(
        config: &Config,
        source: Arc<dyn MarketDataSource>,
        store: SessionStore,
    ) -> Result<Self> {
        let calendar = TradingCalendar::new(parse_timezone(&config.timezone)?);
        let clock = SessionClock::from_config(config)?;
        Ok(SessionService::new(source, store, calendar, clock))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> MarketStatus {
        let local = self.calendar.local_at(now);
        let today = local.date();
        MarketStatus {
            today,
            last_trading_day: last_trading_day_from(today),
            case: ReconciliationCase::for_date(today),
            phase: self.clock.phase(local),
            market_open: self.clock.market_open(local),
            before_market: self.clock.before_market(local),
            after_market: self.clock.after_market(local),
        }
    }

    pub fn status(&self) -> MarketStatus {
        self.status_at(Utc::now())
    }

    /// Selecting a different symbol supersedes every request still in flight
    fn ticket(&self, symbol: &str) -> Result<RequestTicket> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(QuoteError::InvalidParameter("symbol must not be empty".to_string()));
        }

        let mut selection = self.selection.lock().unwrap_or_else(PoisonError::into_inner);
        if selection.symbol.as_deref() != Some(symbol) {
            selection.symbol = Some(symbol.to_string());
            selection.generation += 1;
            debug!("Selected {} (generation {})", symbol, selection.generation);
        }
        Ok(RequestTicket {
            symbol: symbol.to_string(),
            generation: selection.generation,
        })
    }

    fn is_current(&self, ticket: &RequestTicket) -> bool {
        let selection = self.selection.lock().unwrap_or_else(PoisonError::into_inner);
        selection.generation == ticket.generation
            && selection.symbol.as_deref() == Some(ticket.symbol.as_str())
    }

    pub async fn refresh_history(&self, symbol: &str) -> Result<Option<Reconciliation>> {
        self.refresh_history_at(symbol, Utc::now()).await
    }

    /// Fetch every session relevant at `now`, reconcile and apply.
    /// Returns `Ok(None)` when the result was superseded by another symbol.
    /// Upstream failures degrade to missing data and are never returned.
    pub async fn refresh_history_at(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Reconciliation>> {
        let ticket = self.ticket(symbol)?;
        let status = self.status_at(now);
        let plan = plan_fetch(status.today);

        info!(
            "📊 Refreshing history for {} ({} case, {}, {} fetches)",
            ticket.symbol,
            status.case.as_str(),
            status.phase.as_str(),
            plan.len()
        );

        // All fetches for the case must resolve before reconciling
        let fetched = join_all(plan.iter().map(|range| self.fetch_range(&ticket.symbol, *range))).await;
        let bars: Vec<Bar> = fetched.into_iter().flatten().collect();

        let reconciliation = reconcile(status.today, status.phase, &bars);

        if !self.is_current(&ticket) {
            debug!("Discarding stale history for {}", ticket.symbol);
            return Ok(None);
        }

        let mut merged = self.store.apply_closing_prices(reconciliation.closing).await;

        if let Some((label, points)) = reconciliation.latest_series() {
            debug!("Chart series from {} ({} points)", label.as_str(), points.len());
            self.store.set_history(points.to_vec()).await;

            if merged.closing_price.is_none() {
                if let Some(last) = points.last() {
                    self.store.set_closing_price(Some(last.close)).await;
                    merged.closing_price = Some(last.close);
                }
            }
        } else {
            warn!("No bars for {} in any relevant session", ticket.symbol);
        }

        info!(
            "✅ {} close={:?} previous={:?}",
            ticket.symbol, merged.closing_price, merged.previous_closing_price
        );

        Ok(Some(reconciliation))
    }

    async fn fetch_range(&self, symbol: &str, range: DateRange) -> Vec<Bar> {
        let rows = match self.source.fetch_bars(symbol, range).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    "❌ Bar fetch failed for {} {}..{}: {} ({})",
                    symbol,
                    range.start,
                    range.end,
                    e,
                    e.error_code()
                );
                return Vec::new();
            }
        };

        rows.iter()
            .filter_map(|raw| match Bar::from_raw(raw) {
                Ok(bar) => Some(bar),
                Err(e) => {
                    warn!("Skipping bar for {}: {}", symbol, e);
                    None
                }
            })
            .collect()
    }

    /// Apply the closing prices carried by a quote snapshot
    pub async fn refresh_quote(&self, symbol: &str) -> Result<Option<ClosingPriceSet>> {
        let ticket = self.ticket(symbol)?;

        let quote = match self.source.fetch_quote(&ticket.symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                error!("❌ Quote fetch failed for {}: {} ({})", ticket.symbol, e, e.error_code());
                return Ok(None);
            }
        };

        if !self.is_current(&ticket) {
            debug!("Discarding stale quote for {}", ticket.symbol);
            return Ok(None);
        }

        Ok(Some(self.store.apply_closing_prices(quote.closing_prices()).await))
    }

    /// Store the exchange-reported state. A failed or empty answer keeps the last one.
    pub async fn refresh_market_status(&self, exchange: &str) -> Result<Option<ExchangeStatus>> {
        let exchange = exchange.trim();
        if exchange.is_empty() {
            return Err(QuoteError::InvalidParameter("exchange must not be empty".to_string()));
        }

        match self.source.fetch_market_status(exchange).await {
            Ok(Some(status)) => {
                info!("🏛️ {} market open: {}", exchange, status.is_market_open);
                self.store.set_market_status(status.clone()).await;
                Ok(Some(status))
            }
            Ok(None) => {
                warn!("No market status received for {}", exchange);
                Ok(None)
            }
            Err(e) => {
                error!("❌ Market status fetch failed for {}: {} ({})", exchange, e, e.error_code());
                Ok(None)
            }
        }
    }
}
