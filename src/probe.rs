//! Connectivity probe for the RPC dependency
//!
//! The maintenance scheduler uses this to detect a dead RPC endpoint and
//! trigger a reconnect attempt. Failures stay local; they are surfaced as
//! health signals, never as errors to ledger callers.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::{MintdeskError, Result};

/// External status source checked by the scheduler's health pass
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Attempt to re-establish connectivity
    async fn reconnect(&self) -> Result<()>;
}

/// JSON-RPC health probe against the chain RPC endpoint
pub struct RpcStatusProbe {
    client: reqwest::Client,
    rpc_url: String,
}

impl RpcStatusProbe {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url,
        }
    }

    async fn health_check(&self) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getHealth",
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        match body.get("result").and_then(|r| r.as_str()) {
            Some("ok") => Ok(()),
            _ => Err(MintdeskError::Probe(format!(
                "RPC endpoint unhealthy: {}",
                body
            ))),
        }
    }
}

#[async_trait]
impl StatusProbe for RpcStatusProbe {
    async fn is_connected(&self) -> bool {
        match self.health_check().await {
            Ok(()) => true,
            Err(e) => {
                debug!("RPC health check failed: {}", e);
                false
            }
        }
    }

    async fn reconnect(&self) -> Result<()> {
        // The RPC transport is stateless HTTP; reconnecting means verifying
        // the endpoint answers again
        self.health_check().await
    }
}
