//! Serializes access to the asset store and persists
//! the configuration after every applied mutation.
//!
//! Callers (HTTP handlers, the price poller) share one `PositionService`.
//! Each operation holds the store lock for its whole duration, so mutations
//! are atomic with respect to each other. Save failures are logged and the
//! in-memory state stays authoritative.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use lendcalc_common::types::{
    AssetField, AssetId, AssetKind, CollateralDraft, PositionConfig, Token,
};

use crate::calculations::PositionSummary;
use crate::persistence::{KeyValueStore, load_config, save_config};
use crate::store::{
    AssetStore, BorrowLimit, CollateralUpdate, EditOutcome, QuoteMap, QuoteReport, QuoteTicket,
    Rejection,
};

/// Everything a front end needs to render the position.
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub config: PositionConfig,
    pub summary: PositionSummary,
    pub borrow_limits: Vec<BorrowLimit>,
    pub price_sync_active: bool,
    pub revision: u64,
}

/// Shared handle to the position.
#[derive(Clone)]
pub struct PositionService {
    store: Arc<Mutex<AssetStore>>,
    storage: Arc<dyn KeyValueStore>,
}

impl PositionService {
    /// Restore the saved configuration (or the default) from `storage`.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let config = load_config(storage.as_ref());
        Self::with_store(AssetStore::from_config(config), storage)
    }

    pub fn with_store(store: AssetStore, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            storage,
        }
    }

    pub async fn view(&self) -> PositionView {
        let store = self.store.lock().await;
        PositionView {
            config: store.snapshot(),
            summary: store.summary(),
            borrow_limits: store.borrow_limits(),
            price_sync_active: store.price_sync_active(),
            revision: store.revision(),
        }
    }

    pub async fn summary(&self) -> PositionSummary {
        self.store.lock().await.summary()
    }

    pub async fn snapshot(&self) -> PositionConfig {
        self.store.lock().await.snapshot()
    }

    /// Run a mutation under the store lock and persist if it was applied.
    pub async fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut AssetStore) -> Result<T, Rejection>,
    ) -> Result<T, Rejection> {
        let mut store = self.store.lock().await;
        match f(&mut store) {
            Ok(value) => {
                self.persist(store.snapshot()).await;
                Ok(value)
            }
            Err(rejection) => {
                tracing::debug!(operation, reason = %rejection, "Mutation rejected");
                Err(rejection)
            }
        }
    }

    pub async fn add_collateral(&self, draft: CollateralDraft) -> Result<AssetId, Rejection> {
        self.mutate("add_collateral", |store| {
            store.set_collateral_draft(draft);
            store.add_collateral()
        })
        .await
    }

    /// Remove a collateral asset. An unknown id is rejected and nothing is saved.
    pub async fn remove_collateral(&self, id: &AssetId) -> Result<(), Rejection> {
        self.mutate("remove_collateral", |store| {
            if store.remove_collateral(id) {
                Ok(())
            } else {
                Err(Rejection::UnknownAsset {
                    kind: AssetKind::Collateral,
                    id: id.clone(),
                })
            }
        })
        .await
    }

    pub async fn set_included(&self, id: &AssetId, included: bool) -> Result<(), Rejection> {
        self.mutate("set_included", |store| store.set_included(id, included))
            .await
    }

    pub async fn update_collateral(
        &self,
        id: &AssetId,
        update: CollateralUpdate,
    ) -> Result<(), Rejection> {
        self.mutate("update_collateral", |store| store.update_collateral(id, update))
            .await
    }

    pub async fn edit_collateral(
        &self,
        id: &AssetId,
        field: AssetField,
        value: f64,
    ) -> Result<EditOutcome, Rejection> {
        self.mutate("edit_collateral", |store| {
            store.edit_collateral(id, field, value)
        })
        .await
    }

    pub async fn add_borrowed(&self, draft: Token) -> Result<AssetId, Rejection> {
        self.mutate("add_borrowed", |store| {
            store.set_borrow_draft(draft);
            store.add_borrowed()
        })
        .await
    }

    pub async fn remove_borrowed(&self, id: &AssetId) -> Result<(), Rejection> {
        self.mutate("remove_borrowed", |store| {
            if store.remove_borrowed(id) {
                Ok(())
            } else {
                Err(Rejection::UnknownAsset {
                    kind: AssetKind::Borrowed,
                    id: id.clone(),
                })
            }
        })
        .await
    }

    pub async fn edit_borrowed(
        &self,
        id: &AssetId,
        field: AssetField,
        value: f64,
    ) -> Result<EditOutcome, Rejection> {
        self.mutate("edit_borrowed", |store| store.edit_borrowed(id, field, value))
            .await
    }

    pub async fn set_multiplier(&self, multiplier: f64) -> Result<(), Rejection> {
        self.mutate("set_multiplier", |store| store.set_multiplier(multiplier))
            .await
    }

    // ------------------------------------------------------------
    // Price sync plumbing
    // ------------------------------------------------------------

    pub async fn start_price_sync(&self) -> u64 {
        self.store.lock().await.start_price_sync()
    }

    pub async fn stop_price_sync(&self) {
        self.store.lock().await.stop_price_sync();
    }

    pub async fn price_sync_active(&self) -> bool {
        self.store.lock().await.price_sync_active()
    }

    /// Symbols to quote plus the ticket tagging the fetch, taken atomically.
    pub async fn prepare_quote_request(&self) -> Option<(QuoteTicket, Vec<String>)> {
        let mut store = self.store.lock().await;
        let ticket = store.issue_quote_ticket()?;
        Some((ticket, store.symbols()))
    }

    pub async fn apply_quotes(
        &self,
        ticket: QuoteTicket,
        quotes: &QuoteMap,
    ) -> Result<QuoteReport, Rejection> {
        self.mutate("apply_quotes", |store| store.apply_quotes(ticket, quotes))
            .await
    }

    /// Write the snapshot on the blocking pool. Callers hold the store lock,
    /// so saves land in mutation order.
    async fn persist(&self, config: PositionConfig) {
        let storage = Arc::clone(&self.storage);
        let result =
            tokio::task::spawn_blocking(move || save_config(storage.as_ref(), &config)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to save configuration, continuing in memory");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Save task failed, continuing in memory");
            }
        }
    }
}
