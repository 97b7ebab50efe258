use std::path::PathBuf;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory holding the file-backed key-value store
    pub storage_dir: PathBuf,

    /// Socket address the API server binds to
    pub bind_addr: String,

    /// Price-quote endpoint (CoinGecko `simple/price` compatible)
    pub price_api_url: String,

    /// Live price polling interval in milliseconds (default: 30000)
    pub price_poll_interval_ms: u64,

    /// Timeout for a single quote request in milliseconds (default: 10000)
    pub price_request_timeout_ms: u64,

    /// Start the live price poller at boot
    pub price_sync_enabled: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            storage_dir: lookup("LENDCALC_STORAGE_DIR")
                .unwrap_or_else(|| ".lendcalc".to_string())
                .into(),
            bind_addr: lookup("LENDCALC_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            price_api_url: lookup("PRICE_API_URL").unwrap_or_else(|| {
                "https://api.coingecko.com/api/v3/simple/price".to_string()
            }),
            price_poll_interval_ms: positive_millis(&lookup, "PRICE_POLL_INTERVAL_MS", 30_000)?,
            price_request_timeout_ms: positive_millis(&lookup, "PRICE_REQUEST_TIMEOUT_MS", 10_000)?,
            price_sync_enabled: lookup("PRICE_SYNC_ENABLED")
                .unwrap_or_else(|| "false".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PRICE_SYNC_ENABLED must be true or false"))?,
        })
    }
}

/// Millisecond duration variable. Zero is rejected.
fn positive_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> anyhow::Result<u64> {
    let value = match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid u64", key))?,
        None => default,
    };
    if value == 0 {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}
