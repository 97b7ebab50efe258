//! Symbol table mapping ticker symbols to the quote provider's canonical ids.
//!
//! CoinGecko's `simple/price` endpoint is keyed by coin id (`bitcoin`), not by
//! ticker (`BTC`). Well-known tickers are mapped explicitly; anything else is
//! sent lower-cased as-is.
//!
//! # Usage
//!
//! ```rust
//! use lendcalc_pricesync::symbols::SymbolTable;
//!
//! let table = SymbolTable::coingecko();
//! assert_eq!(table.canonical_id("BTC"), "bitcoin");
//! assert_eq!(table.canonical_id("PEPE"), "pepe");
//! ```

use std::collections::HashMap;

/// Well-known ticker → CoinGecko id pairs.
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("usdc", "usd-coin"),
    ("usdt", "tether"),
    ("sol", "solana"),
    ("bnb", "binancecoin"),
    ("dai", "dai"),
    ("wbtc", "wrapped-bitcoin"),
    ("steth", "staked-ether"),
    ("matic", "matic-network"),
    ("avax", "avalanche-2"),
    ("link", "chainlink"),
    ("arb", "arbitrum"),
    ("op", "optimism"),
];

/// Immutable ticker → canonical id table, passed to the quote client.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Map of lower-case ticker → canonical id.
    ids: HashMap<String, String>,
}

impl SymbolTable {
    /// Table with the default CoinGecko mappings.
    pub fn coingecko() -> Self {
        Self::custom(COINGECKO_IDS.iter().copied())
    }

    /// Table with custom mappings only.
    pub fn custom<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            ids: pairs
                .into_iter()
                .map(|(symbol, id)| (symbol.to_lowercase(), id.to_string()))
                .collect(),
        }
    }

    /// Add or replace a mapping.
    pub fn with_alias(mut self, symbol: &str, id: &str) -> Self {
        self.ids.insert(symbol.to_lowercase(), id.to_string());
        self
    }

    /// Canonical id for a ticker, falling back to the lower-cased ticker.
    pub fn canonical_id(&self, symbol: &str) -> String {
        let key = symbol.trim().to_lowercase();
        self.ids.get(&key).cloned().unwrap_or(key)
    }

    /// Number of explicit mappings.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
