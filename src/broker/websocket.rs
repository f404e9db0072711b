/// Push-quote feed transport over WebSocket
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::error::{QuoteError, Result};
use crate::types::Config;

/// Inbound side of a feed connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Text(String),
    /// Reported, not fatal. A `Closed` event may or may not follow.
    Error(String),
    Closed,
}

/// An open feed. Dropping it tears the underlying connection down.
pub struct FeedConnection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<FeedEvent>,
}

pub trait FeedTransport: Send + Sync + 'static {
    fn open(&self) -> BoxFuture<'_, Result<FeedConnection>>;
}

pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: String) -> Self {
        WebSocketTransport { url }
    }

    pub fn from_config(config: &Config) -> Self {
        WebSocketTransport::new(format!("{}?apikey={}", config.ws_url, config.api_key))
    }

    async fn open_socket(&self) -> Result<FeedConnection> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| QuoteError::WebSocketError(format!("Connection failed: {}", e)))?;

        info!("✅ Feed WebSocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<FeedEvent>();

        // Writer: ends when the FeedConnection is dropped
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!("Feed write failed: {}", e);
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
            debug!("Feed writer task ended");
        });

        // Reader
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(FeedEvent::Text(text)).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Feed closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = in_tx.send(FeedEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
            let _ = in_tx.send(FeedEvent::Closed);
            debug!("Feed reader task ended");
        });

        Ok(FeedConnection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

impl FeedTransport for WebSocketTransport {
    fn open(&self) -> BoxFuture<'_, Result<FeedConnection>> {
        Box::pin(self.open_socket())
    }
}
