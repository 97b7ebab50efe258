//! In-memory asset store: owns the collateral and borrowed collections and the multiplier.
//!
//! Every mutation is synchronous and either fully applies or is rejected
//! without touching state. Borrowed-asset edits are clamped so the borrowed
//! value stays within `total_collateral_value * multiplier`. Collateral edits,
//! inclusion toggles and multiplier changes are never clamped, so utilization
//! may legitimately exceed 100% after them.
//!
//! Live quotes are merged through [`AssetStore::apply_quotes`] using a
//! [`QuoteTicket`] issued before the fetch started. Tickets from a stopped sync
//! session, tickets older than the last applied batch, and quotes for assets
//! whose price was edited by hand after the ticket was issued are discarded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lendcalc_common::types::{
    AssetField, AssetId, AssetKind, BorrowedAsset, CollateralAsset, CollateralDraft,
    PositionConfig, Token, normalize_symbol,
};

use crate::calculations::{
    PositionSummary, max_borrow_amount, total_borrow_value, total_collateral_value,
};

/// Latest USD quotes keyed by upper-case symbol.
pub type QuoteMap = HashMap<String, f64>;

/// Reason a mutation was not applied. State is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("asset name must not be empty")]
    EmptyName,

    #[error("{field} must not be negative (got {value})")]
    NegativeValue { field: AssetField, value: f64 },

    #[error("{field} must be a finite number")]
    NonFiniteValue { field: AssetField },

    #[error("multiplier must be within [0, 1] (got {0})")]
    MultiplierOutOfRange(f64),

    #[error("at least one collateral asset is required before borrowing")]
    NoCollateral,

    #[error("{kind} asset {id} not found")]
    UnknownAsset { kind: AssetKind, id: AssetId },

    #[error("price sync is not active for this quote batch")]
    SyncInactive,

    #[error("quote batch {sequence} is older than the last applied batch")]
    StaleQuotes { sequence: u64 },
}

/// Result of an accepted edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied,
    /// The stored amount was reduced to respect the borrowing ceiling.
    AmountClamped { requested: f64, stored: f64 },
}

/// Partial update of a collateral record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollateralUpdate {
    pub name: Option<String>,
    pub included: Option<bool>,
}

/// Headroom for a single borrowed asset, in its own units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowLimit {
    pub id: AssetId,
    pub name: String,
    /// `None` when the asset has no price to bound it with.
    pub max_amount: Option<f64>,
}

/// Tag attached to a quote fetch so its response can be ordered against
/// newer fetches and manual edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteTicket {
    pub epoch: u64,
    pub sequence: u64,
    pub revision: u64,
}

/// What happened when a quote batch was merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteReport {
    pub updated: Vec<AssetId>,
    /// Assets whose amount was re-clamped because of a new price.
    pub clamped: Vec<AssetId>,
    /// Assets edited by hand after the fetch was issued.
    pub skipped_manual: Vec<AssetId>,
    /// Symbols present in the store without a usable quote.
    pub unquoted: Vec<String>,
}

#[derive(Debug, Default)]
struct SyncState {
    active: bool,
    epoch: u64,
    next_sequence: u64,
    last_applied: Option<u64>,
}

/// In-memory position state.
#[derive(Debug)]
pub struct AssetStore {
    collaterals: Vec<CollateralAsset>,
    borrowed: Vec<BorrowedAsset>,
    multiplier: f64,
    collateral_draft: CollateralDraft,
    borrow_draft: Token,
    /// Incremented on every applied change.
    revision: u64,
    /// Revision of the last manual price edit per asset.
    manual_price_edits: HashMap<AssetId, u64>,
    sync: SyncState,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::from_config(PositionConfig::default())
    }

    /// Build a store from an already-validated configuration.
    pub fn from_config(config: PositionConfig) -> Self {
        Self {
            collaterals: config.collaterals,
            borrowed: config.borrowed_assets,
            multiplier: config.multiplier,
            collateral_draft: CollateralDraft::default(),
            borrow_draft: config.borrow,
            revision: 0,
            manual_price_edits: HashMap::new(),
            sync: SyncState::default(),
        }
    }

    /// Persistable copy of the current state.
    pub fn snapshot(&self) -> PositionConfig {
        PositionConfig {
            collaterals: self.collaterals.clone(),
            borrowed_assets: self.borrowed.clone(),
            borrow: self.borrow_draft.clone(),
            multiplier: self.multiplier,
        }
    }

    pub fn collaterals(&self) -> &[CollateralAsset] {
        &self.collaterals
    }

    pub fn borrowed_assets(&self) -> &[BorrowedAsset] {
        &self.borrowed
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn collateral_draft(&self) -> &CollateralDraft {
        &self.collateral_draft
    }

    pub fn borrow_draft(&self) -> &Token {
        &self.borrow_draft
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn summary(&self) -> PositionSummary {
        PositionSummary::compute(&self.collaterals, &self.borrowed, self.multiplier)
    }

    /// Max amount each borrowed asset could be raised to, holding the others fixed.
    pub fn borrow_limits(&self) -> Vec<BorrowLimit> {
        let collateral_value = total_collateral_value(&self.collaterals);
        self.borrowed
            .iter()
            .enumerate()
            .map(|(index, asset)| BorrowLimit {
                id: asset.id.clone(),
                name: asset.name.clone(),
                max_amount: (asset.price > 0.0).then(|| {
                    max_borrow_amount(
                        collateral_value,
                        self.multiplier,
                        self.other_borrowed_value(index),
                        asset.price,
                    )
                }),
            })
            .collect()
    }

    // ------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------

    pub fn set_collateral_draft(&mut self, mut draft: CollateralDraft) {
        draft.name = normalize_symbol(&draft.name);
        self.collateral_draft = draft;
    }

    pub fn set_borrow_draft(&mut self, mut draft: Token) {
        draft.name = normalize_symbol(&draft.name);
        self.borrow_draft = draft;
        self.bump();
    }

    // ------------------------------------------------------------
    // Collateral
    // ------------------------------------------------------------

    /// Append the current collateral draft and reset it.
    pub fn add_collateral(&mut self) -> Result<AssetId, Rejection> {
        let draft = &self.collateral_draft;
        let name = normalize_symbol(&draft.name);
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        validate_value(AssetField::Price, draft.price)?;
        validate_value(AssetField::Amount, draft.amount)?;

        let asset = CollateralAsset {
            id: AssetId::generate(),
            name,
            price: draft.price,
            amount: draft.amount,
            included: draft.included,
        };
        let id = asset.id.clone();

        tracing::debug!(asset_id = %id, name = %asset.name, "Collateral added");
        self.collaterals.push(asset);
        self.collateral_draft = CollateralDraft::default();
        self.bump();
        Ok(id)
    }

    /// Remove a collateral asset. Returns `false` when the id was absent.
    pub fn remove_collateral(&mut self, id: &AssetId) -> bool {
        let before = self.collaterals.len();
        self.collaterals.retain(|c| &c.id != id);
        let removed = self.collaterals.len() != before;
        if removed {
            self.manual_price_edits.remove(id);
            self.bump();
        }
        removed
    }

    /// Toggle whether a collateral asset counts toward the totals.
    ///
    /// Existing borrows are not re-validated against the new collateral base.
    pub fn set_included(&mut self, id: &AssetId, included: bool) -> Result<(), Rejection> {
        let index = self.collateral_index(id)?;
        self.collaterals[index].included = included;
        self.bump();
        Ok(())
    }

    pub fn update_collateral(
        &mut self,
        id: &AssetId,
        update: CollateralUpdate,
    ) -> Result<(), Rejection> {
        let index = self.collateral_index(id)?;
        let name = match update.name {
            Some(name) => {
                let name = normalize_symbol(&name);
                if name.is_empty() {
                    return Err(Rejection::EmptyName);
                }
                Some(name)
            }
            None => None,
        };

        let asset = &mut self.collaterals[index];
        if let Some(name) = name {
            asset.name = name;
        }
        if let Some(included) = update.included {
            asset.included = included;
        }
        self.bump();
        Ok(())
    }

    /// Set a collateral field. Never clamped by borrowing limits.
    pub fn edit_collateral(
        &mut self,
        id: &AssetId,
        field: AssetField,
        value: f64,
    ) -> Result<EditOutcome, Rejection> {
        validate_value(field, value)?;
        let index = self.collateral_index(id)?;

        let asset = &mut self.collaterals[index];
        match field {
            AssetField::Amount => asset.amount = value,
            AssetField::Price => asset.price = value,
        }

        let revision = self.bump();
        if field == AssetField::Price {
            self.manual_price_edits.insert(id.clone(), revision);
        }
        Ok(EditOutcome::Applied)
    }

    // ------------------------------------------------------------
    // Borrowed
    // ------------------------------------------------------------

    /// Append the current borrow draft and reset it.
    ///
    /// Requires at least one collateral asset. A priced draft is clamped to the
    /// remaining capacity; an unpriced one contributes no value and is kept as-is.
    pub fn add_borrowed(&mut self) -> Result<AssetId, Rejection> {
        let draft = &self.borrow_draft;
        let name = normalize_symbol(&draft.name);
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        if self.collaterals.is_empty() {
            return Err(Rejection::NoCollateral);
        }
        validate_value(AssetField::Price, draft.price)?;
        validate_value(AssetField::Amount, draft.amount)?;

        let amount = if draft.price > 0.0 {
            let ceiling = max_borrow_amount(
                total_collateral_value(&self.collaterals),
                self.multiplier,
                total_borrow_value(&self.borrowed),
                draft.price,
            );
            draft.amount.min(ceiling)
        } else {
            draft.amount
        };

        if amount < draft.amount {
            tracing::debug!(
                name = %name,
                requested = draft.amount,
                stored = amount,
                "Borrowed amount clamped to remaining capacity"
            );
        }

        let asset = BorrowedAsset {
            id: AssetId::generate(),
            name,
            price: draft.price,
            amount,
        };
        let id = asset.id.clone();

        self.borrowed.push(asset);
        self.borrow_draft = Token::default();
        self.bump();
        Ok(id)
    }

    /// Remove a borrowed asset. Returns `false` when the id was absent.
    pub fn remove_borrowed(&mut self, id: &AssetId) -> bool {
        let before = self.borrowed.len();
        self.borrowed.retain(|a| &a.id != id);
        let removed = self.borrowed.len() != before;
        if removed {
            self.manual_price_edits.remove(id);
            self.bump();
        }
        removed
    }

    /// Set a borrowed-asset field, enforcing the borrowing ceiling.
    ///
    /// - `amount`: stored as `min(requested, ceiling)`, where the ceiling is the
    ///   max amount that fits next to the other borrowed assets. A reduction is
    ///   always accepted but still lands at or below the ceiling. With a zero
    ///   price the ceiling is unknown and no increase is permitted.
    /// - `price`: stored as requested, and the current amount is re-capped
    ///   against the new price.
    pub fn edit_borrowed(
        &mut self,
        id: &AssetId,
        field: AssetField,
        value: f64,
    ) -> Result<EditOutcome, Rejection> {
        validate_value(field, value)?;
        let index = self.borrowed_index(id)?;

        let outcome = self.apply_borrowed_edit(index, field, value);

        let revision = self.bump();
        if field == AssetField::Price {
            self.manual_price_edits.insert(id.clone(), revision);
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------
    // Multiplier
    // ------------------------------------------------------------

    /// Change the loan-to-value multiplier. Existing borrows are not re-clamped.
    pub fn set_multiplier(&mut self, multiplier: f64) -> Result<(), Rejection> {
        if !multiplier.is_finite() || !(0.0..=1.0).contains(&multiplier) {
            return Err(Rejection::MultiplierOutOfRange(multiplier));
        }
        self.multiplier = multiplier;
        self.bump();
        Ok(())
    }

    // ------------------------------------------------------------
    // Live quotes
    // ------------------------------------------------------------

    /// Begin a new price-sync session. Tickets from earlier sessions become invalid.
    pub fn start_price_sync(&mut self) -> u64 {
        self.sync.epoch += 1;
        self.sync.active = true;
        self.sync.last_applied = None;
        self.sync.epoch
    }

    /// End the current session. No outstanding ticket can be applied afterwards.
    pub fn stop_price_sync(&mut self) {
        if self.sync.active {
            self.sync.epoch += 1;
            self.sync.active = false;
        }
    }

    pub fn price_sync_active(&self) -> bool {
        self.sync.active
    }

    /// Upper-case symbols of every asset, deduplicated, in store order.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        let names = self
            .collaterals
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.borrowed.iter().map(|a| a.name.as_str()));
        for name in names {
            let symbol = normalize_symbol(name);
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols
    }

    /// Tag a fetch that is about to start. `None` when sync is off.
    pub fn issue_quote_ticket(&mut self) -> Option<QuoteTicket> {
        if !self.sync.active {
            return None;
        }
        let sequence = self.sync.next_sequence;
        self.sync.next_sequence += 1;
        Some(QuoteTicket {
            epoch: self.sync.epoch,
            sequence,
            revision: self.revision,
        })
    }

    /// Overwrite prices of assets whose symbol has a quote.
    ///
    /// Assets without a quote keep their price. Borrowed assets go through the
    /// same clamp as a manual price edit.
    pub fn apply_quotes(
        &mut self,
        ticket: QuoteTicket,
        quotes: &QuoteMap,
    ) -> Result<QuoteReport, Rejection> {
        if !self.sync.active || ticket.epoch != self.sync.epoch {
            return Err(Rejection::SyncInactive);
        }
        if let Some(last) = self.sync.last_applied
            && ticket.sequence <= last
        {
            return Err(Rejection::StaleQuotes {
                sequence: ticket.sequence,
            });
        }
        self.sync.last_applied = Some(ticket.sequence);

        let mut report = QuoteReport::default();

        for index in 0..self.collaterals.len() {
            let (id, symbol) = {
                let asset = &self.collaterals[index];
                (asset.id.clone(), normalize_symbol(&asset.name))
            };
            let Some(price) = usable_quote(quotes, &symbol) else {
                push_unique(&mut report.unquoted, symbol);
                continue;
            };
            if self.edited_since(&id, ticket.revision) {
                report.skipped_manual.push(id);
                continue;
            }
            let asset = &mut self.collaterals[index];
            if asset.price != price {
                asset.price = price;
                report.updated.push(id);
            }
        }

        for index in 0..self.borrowed.len() {
            let (id, symbol, price_before) = {
                let asset = &self.borrowed[index];
                (asset.id.clone(), normalize_symbol(&asset.name), asset.price)
            };
            let Some(price) = usable_quote(quotes, &symbol) else {
                push_unique(&mut report.unquoted, symbol);
                continue;
            };
            if self.edited_since(&id, ticket.revision) {
                report.skipped_manual.push(id);
                continue;
            }
            if price_before == price {
                continue;
            }
            if let EditOutcome::AmountClamped { .. } =
                self.apply_borrowed_edit(index, AssetField::Price, price)
            {
                report.clamped.push(id.clone());
            }
            report.updated.push(id);
        }

        if !report.updated.is_empty() {
            self.bump();
        }

        tracing::debug!(
            sequence = ticket.sequence,
            updated = report.updated.len(),
            skipped = report.skipped_manual.len(),
            unquoted = report.unquoted.len(),
            "Quote batch applied"
        );

        Ok(report)
    }

    // ------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn edited_since(&self, id: &AssetId, revision: u64) -> bool {
        self.manual_price_edits
            .get(id)
            .is_some_and(|edited| *edited > revision)
    }

    fn collateral_index(&self, id: &AssetId) -> Result<usize, Rejection> {
        self.collaterals
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| Rejection::UnknownAsset {
                kind: AssetKind::Collateral,
                id: id.clone(),
            })
    }

    fn borrowed_index(&self, id: &AssetId) -> Result<usize, Rejection> {
        self.borrowed
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| Rejection::UnknownAsset {
                kind: AssetKind::Borrowed,
                id: id.clone(),
            })
    }

    fn other_borrowed_value(&self, index: usize) -> f64 {
        self.borrowed
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, a)| a.value())
            .sum()
    }

    /// Largest amount the asset at `index` may hold at `price`.
    /// Without a price the current amount is the ceiling.
    fn amount_ceiling(&self, index: usize, price: f64) -> f64 {
        if price > 0.0 {
            max_borrow_amount(
                total_collateral_value(&self.collaterals),
                self.multiplier,
                self.other_borrowed_value(index),
                price,
            )
        } else {
            self.borrowed[index].amount
        }
    }

    fn apply_borrowed_edit(&mut self, index: usize, field: AssetField, value: f64) -> EditOutcome {
        let current_amount = self.borrowed[index].amount;

        let (requested, stored) = match field {
            AssetField::Amount => {
                let stored = value.min(self.amount_ceiling(index, self.borrowed[index].price));
                self.borrowed[index].amount = stored;
                (value, stored)
            }
            AssetField::Price => {
                let stored = current_amount.min(self.amount_ceiling(index, value));
                let asset = &mut self.borrowed[index];
                asset.price = value;
                asset.amount = stored;
                (current_amount, stored)
            }
        };

        if stored < requested {
            tracing::debug!(
                asset_id = %self.borrowed[index].id,
                field = %field,
                requested,
                stored,
                "Borrowed amount clamped to borrowing ceiling"
            );
            EditOutcome::AmountClamped { requested, stored }
        } else {
            EditOutcome::Applied
        }
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_value(field: AssetField, value: f64) -> Result<(), Rejection> {
    if !value.is_finite() {
        return Err(Rejection::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(Rejection::NegativeValue { field, value });
    }
    Ok(())
}

fn usable_quote(quotes: &QuoteMap, symbol: &str) -> Option<f64> {
    quotes
        .get(symbol)
        .copied()
        .filter(|price| price.is_finite() && *price >= 0.0)
}

fn push_unique(symbols: &mut Vec<String>, symbol: String) {
    if !symbol.is_empty() && !symbols.contains(&symbol) {
        symbols.push(symbol);
    }
}
