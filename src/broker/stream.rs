/// Live quote stream: one subscription per handle, price dedupe, fixed-delay reconnect
///
/// Each `connect` starts a new generation. A session only reconnects while its
/// generation is current and reconnection is enabled; both are checked again
/// when the delayed reconnect fires, so a `disconnect` or a newer `connect`
/// cancels any pending attempt without touching its timer.
use chrono::Utc;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::websocket::{FeedEvent, FeedTransport};
use crate::data::SessionStore;
use crate::error::{QuoteError, Result};
use crate::types::LiveTick;
use crate::utils::{format_time_to_market_hours, tick_local_time};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Invoked with the tick price and its local `h:mm AM/PM` time
pub type TickCallback = Arc<dyn Fn(Decimal, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Error,
}

impl StreamState {
    pub fn as_str(&self) -> &str {
        match self {
            StreamState::Disconnected => "DISCONNECTED",
            StreamState::Connecting => "CONNECTING",
            StreamState::Connected => "CONNECTED",
            StreamState::Closed => "CLOSED",
            StreamState::Error => "ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    action: &'a str,
    params: SubscribeParams<'a>,
}

#[derive(Debug, Serialize)]
struct SubscribeParams<'a> {
    symbols: &'a str,
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    timestamp: Option<i64>,
}

fn subscribe_message(symbol: &str) -> Result<String> {
    Ok(serde_json::to_string(&SubscribeRequest {
        action: "subscribe",
        params: SubscribeParams { symbols: symbol },
    })?)
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    should_reconnect: bool,
    symbol: Option<String>,
    task: Option<JoinHandle<()>>,
}

struct StreamShared {
    slot: Mutex<Slot>,
    state: watch::Sender<StreamState>,
}

impl StreamShared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
struct SessionContext {
    transport: Arc<dyn FeedTransport>,
    store: SessionStore,
    shared: Arc<StreamShared>,
    symbol: String,
    on_tick: TickCallback,
    tz: Tz,
    reconnect_delay: Duration,
    generation: u64,
}

impl SessionContext {
    /// Publish `state` unless this session has been superseded
    fn set_state(&self, state: StreamState) -> bool {
        let slot = self.shared.lock_slot();
        if slot.generation != self.generation {
            debug!(
                "Dropping {} from superseded session for {}",
                state.as_str(),
                self.symbol
            );
            return false;
        }
        self.shared.state.send_replace(state);
        true
    }
}

/// Owned handle to the live feed of the currently selected symbol
pub struct StreamHandle {
    transport: Arc<dyn FeedTransport>,
    store: SessionStore,
    tz: Tz,
    reconnect_delay: Duration,
    shared: Arc<StreamShared>,
}

impl StreamHandle {
    pub fn new(transport: Arc<dyn FeedTransport>, store: SessionStore, tz: Tz) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        StreamHandle {
            transport,
            store,
            tz,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            shared: Arc::new(StreamShared {
                slot: Mutex::new(Slot::default()),
                state,
            }),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Replace any existing subscription with one for `symbol`.
    /// The previous connection is fully torn down before the new one opens.
    pub async fn connect(&mut self, symbol: &str, on_tick: TickCallback) -> Result<()> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(QuoteError::InvalidParameter("symbol must not be empty".to_string()));
        }

        let (generation, previous) = {
            let mut slot = self.shared.lock_slot();
            slot.generation += 1;
            slot.should_reconnect = true;
            slot.symbol = Some(symbol.to_string());
            (slot.generation, slot.task.take())
        };

        if let Some(task) = previous {
            task.abort();
            let _ = task.await;
            self.store.clear_live().await;
            info!("Closed previous live feed before subscribing to {}", symbol);
        }

        spawn_session(SessionContext {
            transport: Arc::clone(&self.transport),
            store: self.store.clone(),
            shared: Arc::clone(&self.shared),
            symbol: symbol.to_string(),
            on_tick,
            tz: self.tz,
            reconnect_delay: self.reconnect_delay,
            generation,
        });
        Ok(())
    }

    /// Stop the feed and the reconnect loop. Only `connect` re-enables it.
    pub async fn disconnect(&mut self) {
        let task = {
            let mut slot = self.shared.lock_slot();
            slot.should_reconnect = false;
            slot.generation += 1;
            slot.symbol = None;
            slot.task.take()
        };

        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            info!("🔌 Live feed disconnected");
        }
        self.shared.state.send_replace(StreamState::Disconnected);
        self.store.clear_live().await;
    }

    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    pub fn symbol(&self) -> Option<String> {
        self.shared.lock_slot().symbol.clone()
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.shared.lock_slot().should_reconnect
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        let mut slot = self.shared.lock_slot();
        slot.should_reconnect = false;
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
    }
}

/// Start a session for `ctx.generation` unless it has been superseded
fn spawn_session(ctx: SessionContext) {
    let shared = Arc::clone(&ctx.shared);
    let mut slot = shared.lock_slot();
    if slot.generation != ctx.generation || !slot.should_reconnect {
        debug!(
            "Skipping session start for {} (generation {} superseded)",
            ctx.symbol, ctx.generation
        );
        return;
    }
    shared.state.send_replace(StreamState::Connecting);
    slot.task = Some(tokio::spawn(run_session(ctx)));
}

async fn run_session(ctx: SessionContext) {
    info!("🔌 Connecting live feed for {}...", ctx.symbol);

    match ctx.transport.open().await {
        Ok(mut conn) => {
            if !ctx.set_state(StreamState::Connected) {
                return;
            }

            match subscribe_message(&ctx.symbol) {
                Ok(text) => {
                    if conn.outbound.send(text).is_err() {
                        warn!("Feed for {} closed before subscribe was sent", ctx.symbol);
                    } else {
                        info!("📡 Subscribed to {}", ctx.symbol);
                    }
                }
                Err(e) => error!("Failed to encode subscribe for {}: {}", ctx.symbol, e),
            }

            while let Some(event) = conn.inbound.recv().await {
                match event {
                    FeedEvent::Text(text) => handle_message(&ctx, &text).await,
                    FeedEvent::Error(e) => warn!("Live feed error for {}: {}", ctx.symbol, e),
                    FeedEvent::Closed => break,
                }
            }

            ctx.set_state(StreamState::Closed);
            warn!("Live feed for {} closed", ctx.symbol);
        }
        Err(e) => {
            ctx.set_state(StreamState::Error);
            if e.is_recoverable() {
                warn!("Live feed connect failed for {}: {} ({})", ctx.symbol, e, e.error_code());
            } else {
                error!("Live feed connect failed for {}: {} ({})", ctx.symbol, e, e.error_code());
            }
        }
    }

    schedule_reconnect(ctx);
}

async fn handle_message(ctx: &SessionContext, text: &str) {
    let message: FeedMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed feed message: {}", e);
            return;
        }
    };

    let Some(price) = message.price else {
        debug!("Ignoring feed message without price (event: {:?})", message.event);
        return;
    };

    let timestamp = message.timestamp.unwrap_or_else(|| Utc::now().timestamp());
    if !ctx.store.add_live_tick(LiveTick { price, timestamp }).await {
        debug!("Repeated price {} for {} not buffered", price, ctx.symbol);
    }

    let time = tick_local_time(timestamp, ctx.tz)
        .map(format_time_to_market_hours)
        .unwrap_or_default();
    (ctx.on_tick)(price, time);
}

/// One-shot deferred reconnect; the generation check happens again at fire time
fn schedule_reconnect(ctx: SessionContext) {
    {
        let slot = ctx.shared.lock_slot();
        if slot.generation != ctx.generation {
            return;
        }
        ctx.shared.state.send_replace(StreamState::Disconnected);
        if !slot.should_reconnect {
            return;
        }
    }

    warn!(
        "Reconnecting live feed for {} in {}s",
        ctx.symbol,
        ctx.reconnect_delay.as_secs()
    );
    tokio::spawn(async move {
        tokio::time::sleep(ctx.reconnect_delay).await;
        spawn_session(ctx);
    });
}
