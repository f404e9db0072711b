/// Entry point: resolve the session, reconcile history, then stream live quotes
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sessionquote::{
    broker::{StreamHandle, TickCallback, TwelveDataClient, WebSocketTransport},
    config::{load_config, parse_timezone},
    data::SessionStore,
    session::SessionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| "config.toml".to_string());

    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sessionquote={},info", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let symbol = std::env::args()
        .nth(1)
        .or_else(|| config.default_symbol.clone())
        .context("no symbol given (pass one as the first argument or set default_symbol)")?;

    let tz = parse_timezone(&config.timezone)?;
    let store = SessionStore::new(config.live_buffer_capacity, tz);
    let source = Arc::new(TwelveDataClient::new(&config)?);
    let service = SessionService::from_config(&config, source, store.clone())?;

    let status = service.status();
    info!(
        "Starting {} on {} ({}, {} case, last trading day {})",
        symbol,
        status.today,
        status.phase.as_str(),
        status.case.as_str(),
        status.last_trading_day
    );

    service.refresh_market_status(&config.exchange).await?;
    service.refresh_quote(&symbol).await?;
    service.refresh_history(&symbol).await?;

    let transport = Arc::new(WebSocketTransport::from_config(&config));
    let mut stream = StreamHandle::new(transport, store.clone(), tz)
        .with_reconnect_delay(Duration::from_secs(config.reconnect_delay_sec));

    let on_tick: TickCallback = Arc::new(|price, time| info!("💹 {} @ {}", price, time));
    stream.connect(&symbol, on_tick).await?;

    let mut refresh = tokio::time::interval(Duration::from_secs(config.refresh_interval_sec));
    refresh.tick().await;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Err(e) = service.refresh_market_status(&config.exchange).await {
                    error!("Market status refresh failed: {} ({})", e, e.error_code());
                }
                if let Err(e) = service.refresh_history(&symbol).await {
                    if e.is_recoverable() {
                        warn!("History refresh failed, retrying next tick: {} ({})", e, e.error_code());
                    } else {
                        error!("History refresh failed: {} ({})", e, e.error_code());
                        break;
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("listening for Ctrl+C")?;
                info!("Ctrl+C received - shutting down");
                break;
            }
        }
    }

    stream.disconnect().await;

    let prices = store.closing_prices().await;
    info!(
        "Final state: close={:?} previous={:?} latest={:?} exchange_open={}",
        prices.closing_price,
        prices.previous_closing_price,
        store.latest_price().await,
        store.is_market_open().await
    );

    Ok(())
}
