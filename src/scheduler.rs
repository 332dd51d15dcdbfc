//! Periodic maintenance over the shared ledger
//!
//! A fixed-period loop running three independent passes per tick: re-mark
//! open positions at the latest quotes, evict settled trades beyond the
//! retention window, and health-check the RPC dependency (reconnecting it
//! through the retry policy when down). A failing pass is logged and never
//! aborts the remaining passes or the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::engine::ExecutionEngine;
use crate::probe::StatusProbe;
use crate::quotes::QuoteSource;

/// Maintenance cadence and retention settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between maintenance ticks (default: 60s)
    pub interval: Duration,
    /// How long settled trades are kept before eviction (default: 24h)
    pub retention: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Fixed-period maintenance task sharing the ledger with ingestion and callers
pub struct MaintenanceScheduler {
    engine: ExecutionEngine,
    quotes: Arc<dyn QuoteSource>,
    probe: Arc<dyn StatusProbe>,
    retry: RetryPolicy,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl MaintenanceScheduler {
    pub fn new(
        engine: ExecutionEngine,
        quotes: Arc<dyn QuoteSource>,
        probe: Arc<dyn StatusProbe>,
        retry: RetryPolicy,
        config: SchedulerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            quotes,
            probe,
            retry,
            config,
            shutdown,
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run maintenance ticks until shutdown
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "Maintenance scheduler started (interval {:?}, retention {:?})",
            self.config.interval, self.config.retention
        );

        loop {
            let ticked = {
                let mut shutdown = self.shutdown.clone();
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => true,
                    _ = shutdown.changed() => false,
                }
            };
            if !ticked {
                break;
            }

            // Shutdown is observed between passes so a stop request never
            // waits on a full tick
            self.refresh_marks().await;
            if self.shutdown_requested() {
                break;
            }
            self.evict_stale().await;
            if self.shutdown_requested() {
                break;
            }
            self.check_connectivity().await;
        }

        info!("Maintenance scheduler stopped");
    }

    /// Re-mark open positions at the latest quotes.
    ///
    /// Quotes are fetched before taking the ledger lock; no lock is held
    /// across a network call.
    async fn refresh_marks(&self) {
        let symbols = self.engine.open_symbols().await;
        if symbols.is_empty() {
            return;
        }

        let mut prices: HashMap<String, Decimal> = HashMap::new();
        for symbol in symbols {
            match self.quotes.latest_price(&symbol).await {
                Ok(Some(price)) => {
                    prices.insert(symbol, price);
                }
                Ok(None) => debug!("No quote for {}", symbol),
                Err(e) => warn!("Quote refresh for {} failed: {}", symbol, e),
            }
        }

        if !prices.is_empty() {
            self.engine.mark_positions(&prices).await;
            debug!("Re-marked {} positions", prices.len());
        }
    }

    /// Evict settled trades older than the retention window
    async fn evict_stale(&self) {
        let retention = match chrono::Duration::from_std(self.config.retention) {
            Ok(retention) => retention,
            Err(e) => {
                warn!("Invalid retention window: {}", e);
                return;
            }
        };

        let cutoff = chrono::Utc::now() - retention;
        let removed = self.engine.evict_settled_before(cutoff).await;
        if removed > 0 {
            info!("Evicted {} settled trades older than {:?}", removed, self.config.retention);
        }
    }

    /// Health-check the RPC dependency and reconnect it if down
    async fn check_connectivity(&self) {
        if self.probe.is_connected().await {
            return;
        }

        warn!("RPC dependency disconnected, attempting reconnect");
        let probe = self.probe.clone();
        let result = self
            .retry
            .retry("rpc reconnect", move || {
                let probe = probe.clone();
                async move { probe.reconnect().await }
            })
            .await;

        match result {
            Ok(()) => info!("RPC dependency reconnected"),
            // Exhausted attempts: the next tick tries again
            Err(e) => warn!("RPC reconnect failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeSide;
    use crate::error::MintdeskError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct StaticQuotes {
        price: Option<Decimal>,
        fail: bool,
    }

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        async fn latest_price(&self, _symbol: &str) -> crate::error::Result<Option<Decimal>> {
            if self.fail {
                return Err(MintdeskError::Feed("quotes down".to_string()));
            }
            Ok(self.price)
        }
    }

    struct FakeProbe {
        connected: AtomicBool,
        reconnects: AtomicU32,
        recover_on_reconnect: bool,
    }

    impl FakeProbe {
        fn new(connected: bool, recover_on_reconnect: bool) -> Self {
            Self {
                connected: AtomicBool::new(connected),
                reconnects: AtomicU32::new(0),
                recover_on_reconnect,
            }
        }
    }

    #[async_trait]
    impl StatusProbe for FakeProbe {
        async fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn reconnect(&self) -> crate::error::Result<()> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            if self.recover_on_reconnect {
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(MintdeskError::Probe("still down".to_string()))
            }
        }
    }

    async fn funded_engine_with_position() -> ExecutionEngine {
        let engine = ExecutionEngine::new();
        engine.add_funds(dec!(100)).await.unwrap();
        let id = engine
            .place_order("FOO", TradeSide::Buy, dec!(10), dec!(5))
            .await
            .unwrap();
        assert!(engine.settle_order(id, None).await);
        engine
    }

    fn test_config(retention: Duration) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_millis(10),
            retention,
        }
    }

    async fn run_ticks(scheduler: MaintenanceScheduler, shutdown_tx: watch::Sender<bool>) {
        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_remarks_open_positions() {
        let engine = funded_engine_with_position().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = MaintenanceScheduler::new(
            engine.clone(),
            Arc::new(StaticQuotes {
                price: Some(dec!(9)),
                fail: false,
            }),
            Arc::new(FakeProbe::new(true, true)),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            test_config(Duration::from_secs(3600)),
            shutdown_rx,
        );
        run_ticks(scheduler, shutdown_tx).await;

        let pos = engine.position("FOO").await.unwrap();
        assert_eq!(pos.market_value, dec!(90));
        // Entry average untouched by marking
        assert_eq!(pos.avg_price, dec!(5));
    }

    #[tokio::test]
    async fn test_eviction_respects_retention() {
        let engine = funded_engine_with_position().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = MaintenanceScheduler::new(
            engine.clone(),
            Arc::new(StaticQuotes {
                price: None,
                fail: false,
            }),
            Arc::new(FakeProbe::new(true, true)),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            // Zero retention: anything settled is stale by the next tick
            test_config(Duration::ZERO),
            shutdown_rx,
        );
        run_ticks(scheduler, shutdown_tx).await;

        assert!(engine.history().await.is_empty());
        // The position survives eviction
        assert_eq!(engine.position("FOO").await.unwrap().quantity, dec!(10));
    }

    #[tokio::test]
    async fn test_disconnected_probe_triggers_reconnect() {
        let engine = ExecutionEngine::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let probe = Arc::new(FakeProbe::new(false, true));

        let scheduler = MaintenanceScheduler::new(
            engine,
            Arc::new(StaticQuotes {
                price: None,
                fail: false,
            }),
            probe.clone(),
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            test_config(Duration::from_secs(3600)),
            shutdown_rx,
        );
        run_ticks(scheduler, shutdown_tx).await;

        assert!(probe.reconnects.load(Ordering::SeqCst) >= 1);
        assert!(probe.connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_pass_does_not_abort_the_tick() {
        let engine = funded_engine_with_position().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let probe = Arc::new(FakeProbe::new(false, false));

        let scheduler = MaintenanceScheduler::new(
            engine.clone(),
            // Quote pass fails every tick
            Arc::new(StaticQuotes {
                price: None,
                fail: true,
            }),
            probe.clone(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
            test_config(Duration::ZERO),
            shutdown_rx,
        );
        run_ticks(scheduler, shutdown_tx).await;

        // Later passes still ran: eviction and health check both happened
        assert!(engine.history().await.is_empty());
        assert!(probe.reconnects.load(Ordering::SeqCst) >= 1);
    }
}
