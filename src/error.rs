use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::TradeStatus;

/// Main error type for the trading desk
#[derive(Error, Debug)]
pub enum MintdeskError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Status probe error: {0}")]
    Probe(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Ledger errors
    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for MintdeskError
pub type Result<T> = std::result::Result<T, MintdeskError>;

/// Specific error types for ledger operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient position in {symbol}: requested {requested}, held {held}")]
    InsufficientPosition {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("Unknown trade: {0}")]
    UnknownTrade(Uuid),

    #[error("Trade {id} is not pending (status: {status})")]
    NotPending { id: Uuid, status: TradeStatus },
}
