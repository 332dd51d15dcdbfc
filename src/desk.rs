//! Trading desk runtime
//!
//! Assembles the engine, ingestion pipeline, and maintenance scheduler and
//! drives their shared lifecycle: `start` spawns the two background tasks,
//! `stop` signals shutdown and waits for both to drain within a grace
//! period. The ledger stays consistent across stop because every settlement
//! runs to completion under its own lock scope.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backoff::RetryPolicy;
use crate::config::AppConfig;
use crate::engine::ExecutionEngine;
use crate::feed::{IngestionPipeline, PortalFeed, TradeFeed};
use crate::probe::{RpcStatusProbe, StatusProbe};
use crate::quotes::{PortalQuoteSource, QuoteSource};
use crate::scheduler::{MaintenanceScheduler, SchedulerConfig};

/// How long `stop` waits for background tasks before giving up on the join
const STOP_GRACE: Duration = Duration::from_secs(5);

/// The assembled trading desk
pub struct TradingDesk {
    engine: ExecutionEngine,
    shutdown_tx: watch::Sender<bool>,
    pipeline: Option<IngestionPipeline>,
    scheduler: Option<MaintenanceScheduler>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TradingDesk {
    /// Build a desk from configuration with the concrete portal/RPC collaborators
    pub fn from_config(config: &AppConfig) -> Self {
        let feed = PortalFeed::new(
            config.feed.ws_url.clone(),
            config.feed.symbols.clone(),
            config.feed.connect_timeout(),
        );
        let probe = RpcStatusProbe::new(config.rpc.url.clone());
        let quotes = PortalQuoteSource::new(config.quotes.rest_url.clone());

        Self::new(
            ExecutionEngine::new(),
            Box::new(feed),
            Arc::new(probe),
            Arc::new(quotes),
            config.retry.policy(),
            config.scheduler.scheduler_config(),
        )
    }

    /// Build a desk from explicit collaborators
    pub fn new(
        engine: ExecutionEngine,
        feed: Box<dyn TradeFeed>,
        probe: Arc<dyn StatusProbe>,
        quotes: Arc<dyn QuoteSource>,
        retry: RetryPolicy,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline =
            IngestionPipeline::new(engine.clone(), feed, retry.clone(), shutdown_rx.clone());
        let scheduler = MaintenanceScheduler::new(
            engine.clone(),
            quotes,
            probe,
            retry,
            scheduler_config,
            shutdown_rx,
        );

        Self {
            engine,
            shutdown_tx,
            pipeline: Some(pipeline),
            scheduler: Some(scheduler),
            tasks: Vec::new(),
        }
    }

    /// Handle to the trade lifecycle API
    pub fn engine(&self) -> ExecutionEngine {
        self.engine.clone()
    }

    /// Spawn the ingestion pipeline and maintenance scheduler.
    /// Calling start twice is a no-op.
    pub fn start(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            self.tasks.push(("pipeline", tokio::spawn(pipeline.run())));
        }
        if let Some(scheduler) = self.scheduler.take() {
            self.tasks.push(("scheduler", tokio::spawn(scheduler.run())));
        }
        if !self.tasks.is_empty() {
            info!("Trading desk started");
        }
    }

    /// Signal shutdown and wait for the background tasks to finish.
    ///
    /// The pipeline finishes the event it is settling and closes its
    /// connection; the scheduler exits between passes. Tasks still running
    /// after the grace period are aborted.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);

        for (name, mut task) in self.tasks.drain(..) {
            match tokio::time::timeout(STOP_GRACE, &mut task).await {
                Ok(Ok(())) => info!("{} stopped", name),
                Ok(Err(e)) => warn!("{} task failed: {}", name, e),
                Err(_) => {
                    warn!("{} did not stop within {:?}, aborting", name, STOP_GRACE);
                    task.abort();
                }
            }
        }
    }
}
