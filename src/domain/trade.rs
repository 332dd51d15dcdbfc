use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Trade status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    /// Trade created, not yet settled or cancelled
    Pending,
    /// Trade settled against balance and position
    Executed,
    /// Trade cancelled before settlement
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Executed | TradeStatus::Cancelled)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "PENDING"),
            TradeStatus::Executed => write!(f, "EXECUTED"),
            TradeStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A single buy/sell intent tracked by the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    /// Requested price per unit; overwritten with the settlement price on execution
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: TradeStatus,
}

impl Trade {
    pub fn new(symbol: String, side: TradeSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            side,
            quantity,
            price,
            created_at: Utc::now(),
            status: TradeStatus::Pending,
        }
    }

    /// Total notional at the recorded price
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Signed quantity: positive for BUY, negative for SELL
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => self.quantity,
            TradeSide::Sell => -self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_terminal() {
        assert!(!TradeStatus::Pending.is_terminal());
        assert!(TradeStatus::Executed.is_terminal());
        assert!(TradeStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_new_trade_is_pending() {
        let trade = Trade::new("FOO".to_string(), TradeSide::Buy, dec!(10), dec!(5));
        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.notional(), dec!(50));
    }

    #[test]
    fn test_signed_quantity() {
        let buy = Trade::new("FOO".to_string(), TradeSide::Buy, dec!(3), dec!(1));
        let sell = Trade::new("FOO".to_string(), TradeSide::Sell, dec!(3), dec!(1));
        assert_eq!(buy.signed_quantity(), dec!(3));
        assert_eq!(sell.signed_quantity(), dec!(-3));
    }
}
