//! Real-time trade feed: transport trait, WebSocket client, ingestion pipeline

pub mod pipeline;
pub mod portal;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::TradeSide;
use crate::error::Result;

pub use pipeline::{ConnectionState, IngestionPipeline};
pub use portal::PortalFeed;

/// A single externally-executed trade pushed by the feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Identifier assigned by the external venue (e.g. transaction signature)
    pub external_id: String,
}

/// Persistent subscription to an external push feed of trade executions
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Establish the subscription
    async fn connect(&mut self) -> Result<()>;

    /// Receive the next event.
    ///
    /// `Ok(None)` means the peer disconnected cleanly; an error means the
    /// connection failed. Either way the caller is expected to reconnect.
    async fn receive_next(&mut self) -> Result<Option<FeedEvent>>;

    /// Close the underlying connection
    async fn close(&mut self);
}
