//! Live price-quote client.
//!
//! Quotes are fetched from a CoinGecko-compatible `simple/price` endpoint:
//!
//! ```text
//! GET {base_url}?ids=bitcoin,ethereum&vs_currencies=usd
//! → { "bitcoin": { "usd": 64000.0 }, "ethereum": { "usd": 3100.0 } }
//! ```
//!
//! An id absent from the response means "no quote available" for every
//! symbol mapped to it. That is reported in [`QuoteBatch::missing`], not as
//! an error.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use lendcalc_common::types::normalize_symbol;
use lendcalc_engine::store::QuoteMap;

use crate::symbols::SymbolTable;

/// Provider ID constant
const PROVIDER_ID: &str = "COINGECKO";

/// Errors raised while fetching quotes. All of them are recoverable.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Quote provider returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("No quote available for {0}")]
    MissingSymbol(String),

    #[error("Invalid quote response: {0}")]
    Decode(String),
}

/// Prices for a set of symbols fetched in one request.
#[derive(Debug, Clone)]
pub struct QuoteBatch {
    /// USD prices keyed by upper-case symbol.
    pub prices: QuoteMap,
    /// Requested symbols the provider returned no quote for.
    pub missing: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Source of USD quotes keyed by ticker symbol.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &'static str;

    /// Fetch quotes for every symbol in one round trip.
    async fn fetch_prices(&self, symbols: &[String]) -> Result<QuoteBatch, QuoteError>;

    /// Fetch a single symbol's quote.
    async fn fetch_price(&self, symbol: &str) -> Result<f64, QuoteError> {
        let symbol = normalize_symbol(symbol);
        let batch = self.fetch_prices(std::slice::from_ref(&symbol)).await?;
        batch
            .prices
            .get(&symbol)
            .copied()
            .ok_or(QuoteError::MissingSymbol(symbol))
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
}

/// Client for CoinGecko's `simple/price` endpoint.
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    symbols: SymbolTable,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        symbols: SymbolTable,
    ) -> Result<Self, QuoteError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            symbols,
        })
    }

    /// Unique canonical ids for a list of symbols, in first-seen order.
    pub fn request_ids(&self, symbols: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let id = self.symbols.canonical_id(symbol);
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Map a decoded response back onto the requested symbols.
    fn map_response(&self, symbols: &[String], body: &HashMap<String, SimplePrice>) -> QuoteBatch {
        let mut prices = QuoteMap::new();
        let mut missing = Vec::new();

        for symbol in symbols {
            let symbol = normalize_symbol(symbol);
            let id = self.symbols.canonical_id(&symbol);
            match body.get(&id).and_then(|quote| quote.usd) {
                Some(usd) if usd.is_finite() && usd >= 0.0 => {
                    prices.insert(symbol, usd);
                }
                _ => {
                    if !missing.contains(&symbol) {
                        missing.push(symbol);
                    }
                }
            }
        }

        QuoteBatch {
            prices,
            missing,
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
impl QuoteProvider for CoinGeckoClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_prices(&self, symbols: &[String]) -> Result<QuoteBatch, QuoteError> {
        let ids = self.request_ids(symbols);
        if ids.is_empty() {
            return Ok(QuoteBatch {
                prices: QuoteMap::new(),
                missing: Vec::new(),
                fetched_at: Utc::now(),
            });
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("ids", ids.join(",")), ("vs_currencies", "usd".to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(provider = PROVIDER_ID, status = %status, "Quote request failed");
            return Err(QuoteError::Status(status));
        }

        let body: HashMap<String, SimplePrice> = response
            .json()
            .await
            .map_err(|e| QuoteError::Decode(e.to_string()))?;

        let batch = self.map_response(symbols, &body);
        tracing::debug!(
            provider = PROVIDER_ID,
            requested = ids.len(),
            quoted = batch.prices.len(),
            missing = batch.missing.len(),
            "Fetched quotes"
        );
        Ok(batch)
    }
}
