//! In-memory ledger of trades, positions, and cash balance
//!
//! Pure data with invariant-preserving mutators; all locking lives in the
//! execution engine that owns the ledger. Settlement is the only operation
//! that touches balance and positions, and it either applies completely or
//! not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Position, Trade, TradeSide, TradeStatus};
use crate::error::TradeError;

/// Ledger of trading activity for the lifetime of the process
#[derive(Debug, Default)]
pub struct Ledger {
    balance: Decimal,
    trades: HashMap<Uuid, Trade>,
    positions: HashMap<String, Position>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cash balance
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Add funds to the trading account
    pub fn add_funds(&mut self, amount: Decimal) -> Result<(), TradeError> {
        if amount <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }
        self.balance += amount;
        Ok(())
    }

    /// Record a new pending order. No balance or position effect until settled.
    pub fn record_order(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Uuid, TradeError> {
        if symbol.trim().is_empty() {
            return Err(TradeError::Validation("symbol must not be empty".to_string()));
        }
        if quantity <= Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        if price < Decimal::ZERO {
            return Err(TradeError::Validation(format!(
                "price must not be negative, got {}",
                price
            )));
        }

        let trade = Trade::new(symbol.to_string(), side, quantity, price);
        let id = trade.id;
        self.trades.insert(id, trade);
        Ok(id)
    }

    /// Settle a pending trade, applying its effect to balance and position.
    ///
    /// The settlement price defaults to the originally requested price.
    /// On any failure the ledger is left untouched and the trade stays pending.
    pub fn settle(
        &mut self,
        id: Uuid,
        settlement_price: Option<Decimal>,
    ) -> Result<(), TradeError> {
        let trade = self
            .trades
            .get(&id)
            .ok_or(TradeError::UnknownTrade(id))?;

        if trade.status != TradeStatus::Pending {
            return Err(TradeError::NotPending {
                id,
                status: trade.status,
            });
        }

        let exec_price = settlement_price.unwrap_or(trade.price);
        let cost = exec_price * trade.quantity;
        let (symbol, side, quantity) = (trade.symbol.clone(), trade.side, trade.quantity);

        // Check preconditions before mutating anything
        match side {
            TradeSide::Buy => {
                if self.balance < cost {
                    return Err(TradeError::InsufficientFunds {
                        required: cost,
                        available: self.balance,
                    });
                }
            }
            TradeSide::Sell => {
                let held = self
                    .positions
                    .get(&symbol)
                    .map(|p| p.quantity)
                    .unwrap_or(Decimal::ZERO);
                if held < quantity {
                    return Err(TradeError::InsufficientPosition {
                        symbol,
                        requested: quantity,
                        held,
                    });
                }
            }
        }

        match side {
            TradeSide::Buy => self.balance -= cost,
            TradeSide::Sell => self.balance += cost,
        }

        let delta = match side {
            TradeSide::Buy => quantity,
            TradeSide::Sell => -quantity,
        };
        self.positions
            .entry(symbol.clone())
            .or_insert_with(|| Position::new(symbol))
            .apply(delta, exec_price);

        let trade = self.trades.get_mut(&id).expect("trade checked above");
        trade.status = TradeStatus::Executed;
        trade.price = exec_price;

        Ok(())
    }

    /// Cancel a pending trade. No balance or position effect.
    pub fn cancel(&mut self, id: Uuid) -> Result<(), TradeError> {
        let trade = self
            .trades
            .get_mut(&id)
            .ok_or(TradeError::UnknownTrade(id))?;

        if trade.status != TradeStatus::Pending {
            return Err(TradeError::NotPending {
                id,
                status: trade.status,
            });
        }

        trade.status = TradeStatus::Cancelled;
        Ok(())
    }

    /// Get the trade with the given id
    pub fn trade(&self, id: Uuid) -> Option<&Trade> {
        self.trades.get(&id)
    }

    /// Current position for a symbol, if one has ever been opened
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// All positions with a non-zero quantity
    pub fn positions(&self) -> HashMap<String, Position> {
        self.positions
            .iter()
            .filter(|(_, p)| !p.quantity.is_zero())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Symbols with an open (non-zero) position, for mark refresh
    pub fn open_symbols(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|(_, p)| !p.quantity.is_zero())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// All trades, most recent first
    pub fn history(&self) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self.trades.values().cloned().collect();
        // Newest first; id as a deterministic tiebreak for equal timestamps
        trades.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        trades
    }

    /// The oldest pending trade matching symbol, side, and quantity
    pub fn find_pending(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
    ) -> Option<Uuid> {
        self.trades
            .values()
            .filter(|t| {
                t.status == TradeStatus::Pending
                    && t.symbol == symbol
                    && t.side == side
                    && t.quantity == quantity
            })
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|t| t.id)
    }

    /// Total portfolio value: balance plus open positions marked at the given prices.
    ///
    /// Positions without a price in the map are skipped, not valued at zero.
    pub fn portfolio_value(&self, market_prices: &HashMap<String, Decimal>) -> Decimal {
        let mut value = self.balance;
        for (symbol, position) in &self.positions {
            if position.quantity > Decimal::ZERO {
                if let Some(price) = market_prices.get(symbol) {
                    value += position.quantity * *price;
                }
            }
        }
        value
    }

    /// Re-mark a position's market value at the latest known price
    pub fn mark_position(&mut self, symbol: &str, price: Decimal) {
        if let Some(position) = self.positions.get_mut(symbol) {
            position.mark(price);
        }
    }

    /// Remove settled (executed or cancelled) trades created before the cutoff.
    ///
    /// Pending trades and positions are never evicted. Returns the number of
    /// trades removed.
    pub fn evict_settled_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.trades.len();
        self.trades
            .retain(|_, t| !(t.status.is_terminal() && t.created_at < cutoff));
        before - self.trades.len()
    }
}
