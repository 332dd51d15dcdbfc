//! Order execution engine
//!
//! Thin orchestration over the ledger exposing the trade lifecycle:
//! PENDING -> EXECUTED via settlement, PENDING -> CANCELLED via cancel,
//! both terminal. The engine holds the ledger behind a single RwLock and is
//! its sole writer; every compound mutation runs under one write-lock scope
//! so concurrent settlements can never interleave partially.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Position, Trade, TradeSide};
use crate::error::TradeError;
use crate::ledger::Ledger;
use crate::sink::{PersistenceSink, TracingSink};

/// Shared handle to the ledger with the trade lifecycle API
#[derive(Clone)]
pub struct ExecutionEngine {
    ledger: Arc<RwLock<Ledger>>,
    sink: Arc<dyn PersistenceSink>,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(sink: Arc<dyn PersistenceSink>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::new())),
            sink,
        }
    }

    /// Add funds to the trading account. Rejects non-positive amounts.
    pub async fn add_funds(&self, amount: Decimal) -> Result<(), TradeError> {
        self.ledger.write().await.add_funds(amount)
    }

    /// Place a new pending order
    pub async fn place_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Uuid, TradeError> {
        self.ledger
            .write()
            .await
            .record_order(symbol, side, quantity, price)
    }

    /// Settle a pending order, optionally at an explicit settlement price.
    ///
    /// Returns true on success; failures are logged with their reason and
    /// leave the ledger untouched.
    pub async fn settle_order(&self, id: Uuid, settlement_price: Option<Decimal>) -> bool {
        let settled = {
            let mut ledger = self.ledger.write().await;
            match ledger.settle(id, settlement_price) {
                Ok(()) => {
                    let trade = ledger.trade(id).cloned();
                    let position = trade
                        .as_ref()
                        .and_then(|t| ledger.position(&t.symbol).cloned());
                    trade.zip(position)
                }
                Err(e) => {
                    warn!("Settlement of {} refused: {}", id, e);
                    return false;
                }
            }
        };

        // Sink reporting happens outside the lock and never affects the result
        if let Some((trade, position)) = settled {
            self.report(&trade, &position).await;
        }
        true
    }

    /// Cancel a pending order. Returns true on success.
    pub async fn cancel_order(&self, id: Uuid) -> bool {
        match self.ledger.write().await.cancel(id) {
            Ok(()) => true,
            Err(e) => {
                debug!("Cancel of {} refused: {}", id, e);
                false
            }
        }
    }

    /// Apply an externally-executed trade reported by the feed.
    ///
    /// Settles the oldest matching pending order, or records and settles a
    /// synthesized one, always at the reported execution price. The whole
    /// match-or-record-then-settle sequence runs under one write lock.
    pub async fn apply_execution(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Uuid, TradeError> {
        let (id, settled) = {
            let mut ledger = self.ledger.write().await;

            let id = match ledger.find_pending(symbol, side, quantity) {
                Some(id) => id,
                None => ledger.record_order(symbol, side, quantity, price)?,
            };
            ledger.settle(id, Some(price))?;

            let trade = ledger.trade(id).cloned();
            let position = trade
                .as_ref()
                .and_then(|t| ledger.position(&t.symbol).cloned());
            (id, trade.zip(position))
        };

        if let Some((trade, position)) = settled {
            self.report(&trade, &position).await;
        }
        Ok(id)
    }

    /// Current cash balance
    pub async fn balance(&self) -> Decimal {
        self.ledger.read().await.balance()
    }

    /// Current position for a symbol
    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.ledger.read().await.position(symbol).cloned()
    }

    /// All open positions
    pub async fn positions(&self) -> HashMap<String, Position> {
        self.ledger.read().await.positions()
    }

    /// All trades, most recent first
    pub async fn history(&self) -> Vec<Trade> {
        self.ledger.read().await.history()
    }

    /// Balance plus open positions valued at the given market prices
    pub async fn portfolio_value(&self, market_prices: &HashMap<String, Decimal>) -> Decimal {
        self.ledger.read().await.portfolio_value(market_prices)
    }

    /// Symbols with an open position
    pub async fn open_symbols(&self) -> Vec<String> {
        self.ledger.read().await.open_symbols()
    }

    /// Re-mark position values at the given prices
    pub async fn mark_positions(&self, prices: &HashMap<String, Decimal>) {
        let mut ledger = self.ledger.write().await;
        for (symbol, price) in prices {
            ledger.mark_position(symbol, *price);
        }
    }

    /// Evict settled trades created before the cutoff, returning the count removed
    pub async fn evict_settled_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> usize {
        self.ledger.write().await.evict_settled_before(cutoff)
    }

    async fn report(&self, trade: &Trade, position: &Position) {
        if let Err(e) = self.sink.record_execution(trade, position).await {
            warn!("Persistence sink rejected execution {}: {}", trade.id, e);
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
