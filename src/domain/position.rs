use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate holding in one symbol
///
/// Created lazily on the first executed trade for its symbol and kept for
/// history even after the quantity returns to zero. Quantity is never
/// negative; short positions are not allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    /// Volume-weighted average entry price; reset to zero when quantity reaches zero
    pub avg_price: Decimal,
    /// Last-marked value: quantity x latest execution price
    pub market_value: Decimal,
}

impl Position {
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            market_value: Decimal::ZERO,
        }
    }

    /// Apply a signed quantity change at the given execution price.
    ///
    /// Positive delta for a buy, negative for a sell. The average entry
    /// price is volume-weighted over the prior quantity; a flat position
    /// resets it to zero to avoid dividing by zero.
    pub fn apply(&mut self, delta: Decimal, price: Decimal) {
        if self.quantity.is_zero() {
            self.quantity = delta;
            self.avg_price = price;
        } else {
            let total_value = self.quantity * self.avg_price + delta * price;
            self.quantity += delta;
            if self.quantity.is_zero() {
                self.avg_price = Decimal::ZERO;
            } else {
                self.avg_price = total_value / self.quantity;
            }
        }

        self.market_value = self.quantity * price;
    }

    /// Re-mark the position value at the latest known price
    pub fn mark(&mut self, price: Decimal) {
        self.market_value = self.quantity * price;
    }
}
