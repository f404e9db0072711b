/// Shared session state read by the UI layer: closing prices, live ticks, chart series, exchange state
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use chrono_tz::Tz;

use super::tick_buffer::LiveTickBuffer;
use crate::types::{ChartPoint, ClosingPriceSet, ClosingPriceUpdate, ExchangeStatus, LiveTick};
use crate::utils::format_tick_time;

#[derive(Debug, Default)]
struct StoreState {
    closing: ClosingPriceSet,
    live: LiveTickBuffer,
    history: Vec<ChartPoint>,
    market_status: Option<ExchangeStatus>,
}

/// Cheap to clone; all clones share the same state
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<RwLock<StoreState>>,
    tz: Tz,
}

impl SessionStore {
    pub fn new(live_capacity: usize, tz: Tz) -> Self {
        SessionStore {
            state: Arc::new(RwLock::new(StoreState {
                live: LiveTickBuffer::new(live_capacity),
                ..StoreState::default()
            })),
            tz,
        }
    }

    pub async fn set_closing_price(&self, price: Option<Decimal>) {
        let mut state = self.state.write().await;
        state.closing.closing_price = price;
    }

    pub async fn set_previous_closing_price(&self, price: Option<Decimal>) {
        let mut state = self.state.write().await;
        state.closing.previous_closing_price = price;
    }

    /// Merge derived prices; absent values never clear a known one
    pub async fn apply_closing_prices(&self, update: ClosingPriceUpdate) -> ClosingPriceSet {
        let mut state = self.state.write().await;
        if let Some(price) = update.closing_price {
            state.closing.closing_price = Some(price);
        }
        if let Some(price) = update.previous_closing_price {
            state.closing.previous_closing_price = Some(price);
        }
        debug!(
            "Closing prices now close={:?} previous={:?}",
            state.closing.closing_price, state.closing.previous_closing_price
        );
        state.closing
    }

    pub async fn closing_prices(&self) -> ClosingPriceSet {
        self.state.read().await.closing
    }

    /// Returns `false` if the tick was dropped as a repeat of the last price
    pub async fn add_live_tick(&self, tick: LiveTick) -> bool {
        let mut state = self.state.write().await;
        state.live.push(tick)
    }

    pub async fn live_ticks(&self) -> Vec<LiveTick> {
        self.state.read().await.live.all()
    }

    pub async fn clear_live(&self) {
        self.state.write().await.live.clear();
    }

    pub async fn latest_price(&self) -> Option<Decimal> {
        self.state.read().await.live.last().map(|t| t.price)
    }

    pub async fn latest_time(&self) -> Option<String> {
        let timestamp = self.state.read().await.live.last().map(|t| t.timestamp)?;
        format_tick_time(timestamp, self.tz)
    }

    /// Replace the chart series backing the most recent session
    pub async fn set_history(&self, points: Vec<ChartPoint>) {
        self.state.write().await.history = points;
    }

    pub async fn history(&self) -> Vec<ChartPoint> {
        self.state.read().await.history.clone()
    }

    pub async fn set_market_status(&self, status: ExchangeStatus) {
        self.state.write().await.market_status = Some(status);
    }

    pub async fn market_status(&self) -> Option<ExchangeStatus> {
        self.state.read().await.market_status.clone()
    }

    /// Exchange-reported open flag; `false` until a status has been fetched
    pub async fn is_market_open(&self) -> bool {
        self.state
            .read()
            .await
            .market_status
            .as_ref()
            .is_some_and(|status| status.is_market_open)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        SessionStore::new(super::tick_buffer::DEFAULT_LIVE_CAPACITY, chrono_tz::America::New_York)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_apply_keeps_existing_values() {
        let store = SessionStore::default();
        store.set_closing_price(Some(dec!(100))).await;

        let merged = store.apply_closing_prices(ClosingPriceUpdate::default()).await;
        assert_eq!(merged.closing_price, Some(dec!(100)));

        let merged = store
            .apply_closing_prices(ClosingPriceUpdate {
                closing_price: None,
                previous_closing_price: Some(dec!(98.5)),
            })
            .await;
        assert_eq!(merged.closing_price, Some(dec!(100)));
        assert_eq!(merged.previous_closing_price, Some(dec!(98.5)));
    }

    #[tokio::test]
    async fn test_explicit_unset() {
        let store = SessionStore::default();
        store.set_previous_closing_price(Some(dec!(1))).await;
        store.set_previous_closing_price(None).await;
        assert_eq!(store.closing_prices().await.previous_closing_price, None);
    }

    #[tokio::test]
    async fn test_latest_tick_getters() {
        let store = SessionStore::default();
        assert_eq!(store.latest_price().await, None);
        assert_eq!(store.latest_time().await, None);

        // 2024-06-10 19:59:00 UTC
        store.add_live_tick(LiveTick { price: dec!(101.25), timestamp: 1_718_049_540 }).await;
        assert_eq!(store.latest_price().await, Some(dec!(101.25)));
        assert_eq!(store.latest_time().await.as_deref(), Some("Jun 10, 3:59 PM EDT"));

        store.clear_live().await;
        assert!(store.live_ticks().await.is_empty());
    }

    #[tokio::test]
    async fn test_market_status() {
        let store = SessionStore::default();
        assert!(!store.is_market_open().await);
        assert!(store.market_status().await.is_none());

        store
            .set_market_status(ExchangeStatus {
                name: Some("NYSE".to_string()),
                is_market_open: true,
                ..ExchangeStatus::default()
            })
            .await;
        assert!(store.is_market_open().await);
        assert_eq!(store.market_status().await.and_then(|s| s.name).as_deref(), Some("NYSE"));
    }
}
