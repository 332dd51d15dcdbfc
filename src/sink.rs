//! Fire-and-forget persistence reporting for settled trades
//!
//! Durability is out of scope for the in-memory core; a sink failure is
//! logged and never affects ledger state or caller results.

use async_trait::async_trait;
use tracing::info;

use crate::domain::{Position, Trade};

/// Sink for settled trades and the resulting positions
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Report an executed trade and the position it produced
    async fn record_execution(&self, trade: &Trade, position: &Position) -> Result<(), String>;
}

/// Default sink that just logs executions
pub struct TracingSink;

#[async_trait]
impl PersistenceSink for TracingSink {
    async fn record_execution(&self, trade: &Trade, position: &Position) -> Result<(), String> {
        info!(
            "Executed {} {} {} @ {} (position: {} @ avg {})",
            trade.side, trade.quantity, trade.symbol, trade.price, position.quantity, position.avg_price
        );
        Ok(())
    }
}
