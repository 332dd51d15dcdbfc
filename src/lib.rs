pub mod backoff;
pub mod config;
pub mod desk;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod probe;
pub mod quotes;
pub mod scheduler;
pub mod sink;

pub use backoff::RetryPolicy;
pub use config::AppConfig;
pub use desk::TradingDesk;
pub use domain::{Position, Trade, TradeSide, TradeStatus};
pub use engine::ExecutionEngine;
pub use error::{MintdeskError, Result, TradeError};
pub use feed::{ConnectionState, FeedEvent, IngestionPipeline, PortalFeed, TradeFeed};
pub use ledger::Ledger;
pub use probe::{RpcStatusProbe, StatusProbe};
pub use quotes::{PortalQuoteSource, QuoteSource};
pub use scheduler::{MaintenanceScheduler, SchedulerConfig};
pub use sink::{PersistenceSink, TracingSink};
