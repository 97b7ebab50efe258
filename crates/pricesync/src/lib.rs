//! Live price synchronization for the lending position.
//!
//! [`client`] talks to the quote provider, [`symbols`] maps tickers to the
//! provider's ids, and [`poller`] runs the periodic fetch-and-merge loop.

pub mod client;
pub mod poller;
pub mod symbols;

pub use client::{CoinGeckoClient, QuoteBatch, QuoteError, QuoteProvider};
pub use poller::{PricePoller, PriceSync, SyncStatus};
pub use symbols::SymbolTable;
