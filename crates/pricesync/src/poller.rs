use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

use lendcalc_engine::service::PositionService;
use lendcalc_engine::store::QuoteReport;

use crate::client::{QuoteError, QuoteProvider};

/// Shortest interval the poll loop accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Observable state of the price-sync loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub active: bool,
    pub provider: Option<String>,
    pub interval_ms: u64,
    /// Completed polls (successful or not) in the current session.
    pub polls: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Last recoverable failure, cleared on the next successful poll.
    pub last_error: Option<String>,
    /// Symbols the last applied batch had no quote for.
    pub missing: Vec<String>,
}

/// Fetches quotes for every asset symbol and merges them into the position.
#[derive(Clone)]
pub struct PricePoller {
    service: PositionService,
    provider: Arc<dyn QuoteProvider>,
    poll_interval: Duration,
    status: Arc<RwLock<SyncStatus>>,
}

impl PricePoller {
    pub fn new(
        service: PositionService,
        provider: Arc<dyn QuoteProvider>,
        poll_interval: Duration,
    ) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                requested_ms = poll_interval.as_millis() as u64,
                min_ms = MIN_POLL_INTERVAL.as_millis() as u64,
                "Poll interval too short, using minimum"
            );
        }
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let status = SyncStatus {
            provider: Some(provider.id().to_string()),
            interval_ms: poll_interval.as_millis() as u64,
            ..SyncStatus::default()
        };
        Self {
            service,
            provider,
            poll_interval,
            status: Arc::new(RwLock::new(status)),
        }
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Run one fetch-and-merge cycle.
    ///
    /// Returns `Ok(None)` when sync is off, there is nothing to quote, or the
    /// batch was discarded because sync stopped or a newer batch landed first.
    /// A fetch failure leaves the position untouched.
    pub async fn poll_once(&self) -> Result<Option<QuoteReport>, QuoteError> {
        let Some((ticket, symbols)) = self.service.prepare_quote_request().await else {
            return Ok(None);
        };
        if symbols.is_empty() {
            return Ok(None);
        }

        let batch = match self.provider.fetch_prices(&symbols).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.id(),
                    symbols = symbols.len(),
                    error = %e,
                    "Price fetch failed, keeping current prices"
                );
                let mut status = self.status.write().await;
                status.polls += 1;
                status.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        match self.service.apply_quotes(ticket, &batch.prices).await {
            Ok(report) => {
                if !report.updated.is_empty() {
                    tracing::info!(
                        updated = report.updated.len(),
                        clamped = report.clamped.len(),
                        missing = report.unquoted.len(),
                        "Applied live prices"
                    );
                }
                let mut status = self.status.write().await;
                status.polls += 1;
                status.last_success_at = Some(batch.fetched_at);
                status.last_error = None;
                status.missing = report.unquoted.clone();
                Ok(Some(report))
            }
            Err(rejection) => {
                tracing::debug!(
                    sequence = ticket.sequence,
                    reason = %rejection,
                    "Discarding quote batch"
                );
                Ok(None)
            }
        }
    }

    /// Poll on a fixed interval until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            provider = self.provider.id(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Price sync started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are recorded in the status and retried next tick.
                    let _ = self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Price sync stopped");
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Start/stop controller for the background price poller.
pub struct PriceSync {
    poller: PricePoller,
    running: Option<Running>,
}

impl PriceSync {
    pub fn new(
        service: PositionService,
        provider: Arc<dyn QuoteProvider>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            poller: PricePoller::new(service, provider, poll_interval),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    pub async fn status(&self) -> SyncStatus {
        self.poller.status().await
    }

    /// Open a new sync session and spawn the poll loop. No-op when running.
    pub async fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.poller.service.start_price_sync().await;
        {
            let mut status = self.poller.status.write().await;
            status.active = true;
            status.polls = 0;
            status.last_error = None;
            status.missing.clear();
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(self.poller.clone().run(rx));
        self.running = Some(Running { shutdown, handle });
    }

    /// Close the session. Any fetch still in flight is discarded when it lands.
    pub async fn stop(&mut self) {
        self.poller.service.stop_price_sync().await;

        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(true);
            running.handle.abort();
        }

        self.poller.status.write().await.active = false;
    }

    pub async fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.start().await;
        } else {
            self.stop().await;
        }
    }
}

impl Drop for PriceSync {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}
