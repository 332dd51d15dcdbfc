//! Latest-price lookups for tracked symbols
//!
//! Used by the maintenance scheduler to re-mark open positions. A missing
//! quote is a normal answer, not an error; transport failures bubble up so
//! the scheduler can log and retry on the next tick.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;

/// Source of latest execution prices keyed by symbol
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>>;
}

/// Token info payload from the portal REST API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    price_per_token: Option<Decimal>,
}

/// REST quote source backed by the portal token API
pub struct PortalQuoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl PortalQuoteSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuoteSource for PortalQuoteSource {
    async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let url = format!("{}/api/token/{}", self.base_url, symbol);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let info: TokenInfo = response.error_for_status()?.json().await?;
        Ok(info.price_per_token)
    }
}
