//! One fetch, diff, persist, notify cycle.

use crate::core::{ConfigStore, Manifest, SnapshotFile};
use crate::engine::CheckClock;
use crate::error::{Result, WatchError};
use crate::fetch::{ProductFetcher, fetch_all};
use crate::settings::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS};
use crate::sink::{NotificationSink, broadcast};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Prefix of every service alert.
pub const SERVICE_ALERT_HEADER: &str = "[SERVICE]";

/// What a reconciliation cycle observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The rendered report for the freshly fetched manifest.
    pub report: String,
    /// Whether the manifest differed from the persisted baseline.
    pub changed: bool,
    /// Whether the report was broadcast to the notify channels.
    pub notified: bool,
    /// Every error collected during the cycle, as sent to service channels.
    pub errors: Vec<String>,
}

/// Runs reconciliation cycles.
///
/// Scheduled and manual cycles are serialized: a cycle never starts before
/// the previous one has finished persisting and notifying, so two cycles
/// never race on the persisted manifest.
///
/// The reconciler never returns errors. Fetch, persistence and delivery
/// failures are collected and sent as one alert to the service channels.
pub struct Reconciler {
    config: ConfigStore,
    manifests: SnapshotFile<Manifest>,
    fetcher: Arc<dyn ProductFetcher>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<CheckClock>,
    cycle: Mutex<()>,
    fetch_timeout: Duration,
    send_timeout: Duration,
}

impl Reconciler {
    /// Create a reconciler with default fetch and send budgets.
    pub fn new(
        config: ConfigStore,
        manifests: SnapshotFile<Manifest>,
        fetcher: Arc<dyn ProductFetcher>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            manifests,
            fetcher,
            sink,
            clock: Arc::new(CheckClock::new()),
            cycle: Mutex::new(()),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
        }
    }

    /// Set the per-product fetch budget and the per-channel send budget.
    pub fn with_timeouts(mut self, fetch: Duration, send: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.send_timeout = send;
        self
    }

    /// Timestamps of the last and next check.
    pub fn clock(&self) -> &Arc<CheckClock> {
        &self.clock
    }

    /// The sink used for reports, alerts and replies.
    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// The per-channel send budget.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// The runtime configuration this reconciler reads.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Read the persisted baseline manifest. A missing file is the empty
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub fn last_manifest(&self) -> Result<Manifest> {
        Ok(self.manifests.load()?.unwrap_or_default())
    }

    /// Run one cycle, waiting for any cycle already in progress.
    ///
    /// With `forced`, the report goes to the notify channels even when
    /// nothing changed.
    pub async fn check(&self, forced: bool) -> ReconcileOutcome {
        let _cycle = self.cycle.lock().await;
        self.run_cycle(forced).await
    }

    /// Like [`check`](Self::check), but gives up without running if `token`
    /// is cancelled while waiting for a cycle in progress.
    ///
    /// A cycle that has started always runs to completion.
    pub async fn check_unless_cancelled(
        &self,
        forced: bool,
        token: &CancellationToken,
    ) -> Option<ReconcileOutcome> {
        let _cycle = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            guard = self.cycle.lock() => guard,
        };
        Some(self.run_cycle(forced).await)
    }

    async fn run_cycle(&self, forced: bool) -> ReconcileOutcome {
        let mut errors: Vec<WatchError> = Vec::new();
        let config = self.config.get();

        let fetched = fetch_all(self.fetcher.as_ref(), &config.products, self.fetch_timeout).await;
        errors.extend(fetched.errors);
        let manifest = fetched.manifest;

        let previous = match self.last_manifest() {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot access previous manifest");
                errors.push(e);
                Manifest::default()
            }
        };

        let changed = previous != manifest;
        if changed {
            if let Err(e) = self.manifests.persist(manifest.clone()).await {
                tracing::error!(error = %e, "Cannot save new manifest");
                errors.push(e);
            }
        }

        let report = manifest.render();
        let notified = changed || forced;
        if notified {
            let failures = broadcast(
                self.sink.as_ref(),
                config.notify_channels.as_slice(),
                &report,
                self.send_timeout,
            )
            .await;
            errors.extend(failures);
        }

        self.clock.record_check(Utc::now());

        tracing::info!(
            products = manifest.len(),
            changed,
            forced,
            notified,
            errors = errors.len(),
            "Reconciliation cycle finished"
        );

        let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
        self.escalate(errors).await;

        ReconcileOutcome {
            report,
            changed,
            notified,
            errors: rendered,
        }
    }

    /// Send one aggregate alert for `errors` to the service channels.
    ///
    /// Does nothing when `errors` is empty. Failures to deliver the alert
    /// itself are only logged.
    pub async fn escalate(&self, errors: Vec<WatchError>) {
        if errors.is_empty() {
            return;
        }

        let text = service_alert(&errors);
        tracing::error!("{}", text);

        let config = self.config.get();
        if config.service_channels.is_empty() {
            tracing::warn!("No service channels configured, alert dropped");
            return;
        }

        let failures = broadcast(
            self.sink.as_ref(),
            config.service_channels.as_slice(),
            &text,
            self.send_timeout,
        )
        .await;
        for e in failures {
            tracing::error!(error = %e, "Cannot deliver service alert");
        }
    }
}

/// Render the aggregate alert text for a list of errors.
pub fn service_alert(errors: &[WatchError]) -> String {
    let mut text = String::from(SERVICE_ALERT_HEADER);
    for e in errors {
        text.push('\n');
        text.push_str(&e.to_string());
    }
    text
}
