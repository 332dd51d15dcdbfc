//! Ingestion pipeline for the real-time trade feed
//!
//! Owns one feed subscription for the process lifetime. Events are handled
//! strictly one at a time in arrival order; a slow settlement delays the
//! next receive rather than dropping it. Any I/O failure cycles the
//! connection through CONNECTING with backoff delays from the retry policy.
//! Only an explicit shutdown signal stops the pipeline, and the event being
//! settled at that moment is always finished first.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::{FeedEvent, TradeFeed};
use crate::backoff::RetryPolicy;
use crate::engine::ExecutionEngine;

/// Feed connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Long-running consumer of the external trade feed
pub struct IngestionPipeline {
    engine: ExecutionEngine,
    feed: Box<dyn TradeFeed>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    state_tx: watch::Sender<ConnectionState>,
}

impl IngestionPipeline {
    pub fn new(
        engine: ExecutionEngine,
        feed: Box<dyn TradeFeed>,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            engine,
            feed,
            retry,
            shutdown,
            state_tx,
        }
    }

    /// Observe connection state transitions
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        if *self.state_tx.borrow() != state {
            info!("Feed connection {}", state);
            let _ = self.state_tx.send(state);
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run until shutdown. Never returns on feed errors; those reconnect.
    pub async fn run(mut self) {
        let mut attempt: u32 = 0;

        'lifecycle: while !self.shutdown_requested() {
            self.set_state(ConnectionState::Connecting);

            match self.feed.connect().await {
                Ok(()) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    error!(
                        "Feed connect failed (attempt {}): {}; retrying in {:?}",
                        attempt, e, delay
                    );
                    if self.wait_or_shutdown(delay).await {
                        break 'lifecycle;
                    }
                    continue 'lifecycle;
                }
            }

            // Connected: drain events one at a time until disconnect or shutdown
            loop {
                let received = {
                    let mut shutdown = self.shutdown.clone();
                    if *shutdown.borrow() {
                        break 'lifecycle;
                    }
                    tokio::select! {
                        // The signal (or a dropped sender) stops the pipeline
                        _ = shutdown.changed() => None,
                        received = self.feed.receive_next() => Some(received),
                    }
                };

                let received = match received {
                    Some(received) => received,
                    None => break 'lifecycle,
                };

                match received {
                    Ok(Some(event)) => {
                        // Settlement completes before the next receive; shutdown
                        // observed only between events
                        self.handle_event(event).await;
                        if self.shutdown_requested() {
                            break 'lifecycle;
                        }
                    }
                    Ok(None) => {
                        warn!("Feed disconnected");
                        self.set_state(ConnectionState::Disconnected);
                        break;
                    }
                    Err(e) => {
                        warn!("Feed receive failed: {}", e);
                        self.set_state(ConnectionState::Disconnected);
                        break;
                    }
                }
            }
        }

        self.feed.close().await;
        self.set_state(ConnectionState::Disconnected);
        info!("Ingestion pipeline stopped");
    }

    async fn handle_event(&self, event: FeedEvent) {
        match self
            .engine
            .apply_execution(&event.symbol, event.side, event.quantity, event.price)
            .await
        {
            Ok(id) => {
                info!(
                    "Settled feed execution {} as {} ({} {} {} @ {})",
                    event.external_id, id, event.side, event.quantity, event.symbol, event.price
                );
            }
            Err(e) => {
                warn!(
                    "Feed execution {} for {} not settled: {}",
                    event.external_id, event.symbol, e
                );
            }
        }
    }

    /// Sleep for the delay, returning early (true) if shutdown is signalled
    async fn wait_or_shutdown(&mut self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = shutdown.changed() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TradeSide, TradeStatus};
    use crate::error::MintdeskError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted feed action
    enum Step {
        Event(FeedEvent),
        Disconnect,
        Fail,
    }

    struct ScriptedFeed {
        steps: Arc<Mutex<VecDeque<Step>>>,
        connects: Arc<AtomicU32>,
        closed: Arc<AtomicBool>,
        fail_first_connect: bool,
    }

    #[async_trait]
    impl TradeFeed for ScriptedFeed {
        async fn connect(&mut self) -> crate::error::Result<()> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_first_connect && n == 0 {
                return Err(MintdeskError::Feed("scripted connect failure".to_string()));
            }
            Ok(())
        }

        async fn receive_next(&mut self) -> crate::error::Result<Option<FeedEvent>> {
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Event(event)) => Ok(Some(event)),
                Some(Step::Disconnect) => Ok(None),
                Some(Step::Fail) => Err(MintdeskError::Feed("scripted receive failure".to_string())),
                // Script exhausted: park until the pipeline is shut down
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn buy_event(symbol: &str, quantity: rust_decimal::Decimal, price: rust_decimal::Decimal) -> FeedEvent {
        FeedEvent {
            symbol: symbol.to_string(),
            side: TradeSide::Buy,
            quantity,
            price,
            external_id: format!("sig-{}", symbol),
        }
    }

    struct Harness {
        engine: ExecutionEngine,
        connects: Arc<AtomicU32>,
        closed: Arc<AtomicBool>,
        shutdown_tx: watch::Sender<bool>,
        state: watch::Receiver<ConnectionState>,
        handle: tokio::task::JoinHandle<()>,
    }

    async fn spawn_pipeline(steps: Vec<Step>, fail_first_connect: bool) -> Harness {
        let engine = ExecutionEngine::new();
        engine.add_funds(dec!(100)).await.unwrap();

        let connects = Arc::new(AtomicU32::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let feed = ScriptedFeed {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            connects: connects.clone(),
            closed: closed.clone(),
            fail_first_connect,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let pipeline = IngestionPipeline::new(engine.clone(), Box::new(feed), retry, shutdown_rx);
        let state = pipeline.state();
        let handle = tokio::spawn(pipeline.run());

        Harness {
            engine,
            connects,
            closed,
            shutdown_tx,
            state,
            handle,
        }
    }

    async fn stop(harness: Harness) {
        harness.shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), harness.handle)
            .await
            .expect("pipeline should stop on shutdown")
            .unwrap();
        assert!(harness.closed.load(Ordering::SeqCst));
    }

    async fn wait_for_history(engine: &ExecutionEngine, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while engine.history().await.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("expected trades to settle");
    }

    #[tokio::test]
    async fn test_event_without_matching_order_is_recorded_and_settled() {
        let harness = spawn_pipeline(vec![Step::Event(buy_event("BAR", dec!(4), dec!(2)))], false).await;

        wait_for_history(&harness.engine, 1).await;
        let history = harness.engine.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].symbol, "BAR");
        assert_eq!(history[0].status, TradeStatus::Executed);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_events_settle_in_arrival_order() {
        let harness = spawn_pipeline(
            vec![
                Step::Event(buy_event("FOO", dec!(1), dec!(2))),
                Step::Event(buy_event("FOO", dec!(2), dec!(3))),
                Step::Event(buy_event("FOO", dec!(3), dec!(4))),
            ],
            false,
        )
        .await;

        wait_for_history(&harness.engine, 3).await;

        // 1*2 + 2*3 + 3*4 = 20 spent
        assert_eq!(harness.engine.balance().await, dec!(80));
        let pos = harness.engine.position("FOO").await.unwrap();
        assert_eq!(pos.quantity, dec!(6));

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_reconnects_after_disconnect() {
        let harness = spawn_pipeline(
            vec![
                Step::Event(buy_event("FOO", dec!(1), dec!(1))),
                Step::Disconnect,
                Step::Event(buy_event("BAR", dec!(1), dec!(1))),
            ],
            false,
        )
        .await;

        wait_for_history(&harness.engine, 2).await;
        assert!(harness.connects.load(Ordering::SeqCst) >= 2);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_reconnects_after_receive_failure_and_connect_failure() {
        let harness = spawn_pipeline(
            vec![Step::Fail, Step::Event(buy_event("FOO", dec!(1), dec!(1)))],
            true,
        )
        .await;

        wait_for_history(&harness.engine, 1).await;
        // First connect refused, then connected, then the receive failure
        // forced one more reconnect
        assert!(harness.connects.load(Ordering::SeqCst) >= 3);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_failed_settlement_does_not_stop_the_pipeline() {
        let harness = spawn_pipeline(
            vec![
                // Costs more than the funded balance: settlement refused
                Step::Event(buy_event("FOO", dec!(1000), dec!(1))),
                Step::Event(buy_event("BAR", dec!(1), dec!(1))),
            ],
            false,
        )
        .await;

        wait_for_history(&harness.engine, 2).await;
        let history = harness.engine.history().await;

        let foo = history.iter().find(|t| t.symbol == "FOO").unwrap();
        let bar = history.iter().find(|t| t.symbol == "BAR").unwrap();
        assert_eq!(foo.status, TradeStatus::Pending);
        assert_eq!(bar.status, TradeStatus::Executed);

        stop(harness).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_feed() {
        let mut harness = spawn_pipeline(Vec::new(), false).await;

        // Wait for the pipeline to report the connection before stopping
        tokio::time::timeout(Duration::from_secs(1), async {
            while *harness.state.borrow() != ConnectionState::Connected {
                harness.state.changed().await.unwrap();
            }
        })
        .await
        .expect("pipeline should reach connected state");

        let state = harness.state.clone();
        stop(harness).await;
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }
}
