//! WebSocket client for the portal token-trade stream
//!
//! Connects to the portal's push feed, subscribes to token trades for the
//! configured symbols, and maps trade frames to [`FeedEvent`]s. Frames that
//! do not parse as trades are logged at debug level and skipped.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::{FeedEvent, TradeFeed};
use crate::domain::TradeSide;
use crate::error::{MintdeskError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscribe frame sent after connecting
#[derive(Debug, Serialize)]
struct SubscribeRequest {
    method: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keys: Vec<String>,
}

/// Trade frame pushed by the portal
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalTrade {
    signature: String,
    mint: String,
    tx_type: String,
    token_amount: Decimal,
    price_per_token: Decimal,
}

/// WebSocket trade feed for portal-launched tokens
pub struct PortalFeed {
    ws_url: String,
    symbols: Vec<String>,
    connect_timeout: Duration,
    stream: Option<WsStream>,
}

impl PortalFeed {
    /// Create a feed client subscribing to trades for the given symbols.
    /// An empty symbol list subscribes to all token trades.
    pub fn new(ws_url: String, symbols: Vec<String>, connect_timeout: Duration) -> Self {
        Self {
            ws_url,
            symbols,
            connect_timeout,
            stream: None,
        }
    }

    fn parse_event(text: &str) -> Option<FeedEvent> {
        let trade: PortalTrade = match serde_json::from_str(text) {
            Ok(t) => t,
            Err(_) => {
                debug!("Unrecognized portal message: {}", &text[..text.len().min(120)]);
                return None;
            }
        };

        let side = match trade.tx_type.to_ascii_lowercase().as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            other => {
                debug!("Skipping portal trade with tx type '{}'", other);
                return None;
            }
        };

        if trade.token_amount <= Decimal::ZERO || trade.price_per_token < Decimal::ZERO {
            warn!(
                "Skipping malformed portal trade {} for {}: amount {}, price {}",
                trade.signature, trade.mint, trade.token_amount, trade.price_per_token
            );
            return None;
        }

        Some(FeedEvent {
            symbol: trade.mint,
            side,
            quantity: trade.token_amount,
            price: trade.price_per_token,
            external_id: trade.signature,
        })
    }
}

#[async_trait::async_trait]
impl TradeFeed for PortalFeed {
    async fn connect(&mut self) -> Result<()> {
        let url = Url::parse(&self.ws_url)
            .map_err(|e| MintdeskError::Internal(format!("Invalid WebSocket URL: {}", e)))?;

        info!("Connecting to portal feed: {}", url);

        let (mut ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(&url))
            .await
            .map_err(|_| MintdeskError::Feed("portal connection timeout".to_string()))?
            .map_err(MintdeskError::WebSocket)?;

        let subscribe = SubscribeRequest {
            method: "subscribeTokenTrade",
            keys: self.symbols.clone(),
        };
        ws_stream
            .send(Message::Text(serde_json::to_string(&subscribe)?))
            .await
            .map_err(MintdeskError::WebSocket)?;

        info!("Connected to portal feed ({} symbols)", self.symbols.len());
        self.stream = Some(ws_stream);
        Ok(())
    }

    async fn receive_next(&mut self) -> Result<Option<FeedEvent>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MintdeskError::Feed("feed is not connected".to_string()))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = Self::parse_event(&text) {
                        return Ok(Some(event));
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = stream.send(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Portal feed sent close frame");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(MintdeskError::WebSocket(e));
                }
                None => {
                    info!("Portal feed stream ended");
                    self.stream = None;
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Error closing portal feed: {}", e);
            }
        }
    }
}
