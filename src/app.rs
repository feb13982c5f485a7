//! Wiring of the store, engine and command router into one service.

use crate::commands::{CommandRequest, CommandRouter};
use crate::core::{ConfigStore, SnapshotFile, Validate};
use crate::engine::{Reconciler, Scheduler};
use crate::error::{Result, WatchError};
use crate::fetch::ProductFetcher;
use crate::settings::Settings;
use crate::sink::{NotificationSink, TracingSink};
use std::sync::Arc;

/// A running stock watcher.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::prelude::*;
///
/// # async fn example() -> stockwatch::error::Result<()> {
/// let settings = Settings::loader()
///     .with_file("stockwatch.yaml")
///     .with_env_overrides("STOCKWATCH", "__")
///     .load()?;
///
/// let watch = StockWatch::builder()
///     .with_settings(settings)
///     .with_sink(TracingSink)
///     .build()
///     .await?;
///
/// watch
///     .handle(&CommandRequest::new("@root", "@root", "/add_channel @deals"))
///     .await;
///
/// watch.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct StockWatch {
    config: ConfigStore,
    reconciler: Arc<Reconciler>,
    scheduler: Arc<Scheduler>,
    router: CommandRouter,
}

impl StockWatch {
    /// Create a builder.
    pub fn builder() -> StockWatchBuilder {
        StockWatchBuilder::new()
    }

    /// Handle one operator message. Returns `false` if it was not a command.
    pub async fn handle(&self, request: &CommandRequest) -> bool {
        self.router.handle(request).await
    }

    /// The runtime configuration store.
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// The scheduler driving periodic checks.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The reconciler running the checks.
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Stop the periodic task and wait for it to exit.
    ///
    /// The persisted `active` flag is left as is, so the next process
    /// resumes checking if it was on.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        tracing::info!("Stockwatch shut down");
    }
}

/// Builder for [`StockWatch`].
pub struct StockWatchBuilder {
    settings: Option<Settings>,
    fetcher: Option<Arc<dyn ProductFetcher>>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl StockWatchBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            settings: None,
            fetcher: None,
            sink: None,
        }
    }

    /// Set the process settings. Required.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Set the product fetcher.
    ///
    /// Defaults to [`HttpOfferFetcher`](crate::fetch::HttpOfferFetcher) when
    /// the `http-fetch` feature is enabled, and is required otherwise.
    pub fn with_fetcher(mut self, fetcher: impl ProductFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set the notification sink. Defaults to [`TracingSink`].
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Open the persisted state and start the scheduler if it was active.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No settings were given, or they fail validation
    /// - No fetcher is available
    /// - The configuration snapshot cannot be read
    pub async fn build(self) -> Result<StockWatch> {
        let settings = self
            .settings
            .ok_or_else(|| WatchError::SettingsError("settings are required".to_string()))?;
        settings.validate()?;

        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => default_fetcher(&settings)?,
        };
        let sink: Arc<dyn NotificationSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(TracingSink),
        };

        let config = ConfigStore::open(settings.config_path(), &settings.root_user)?;
        let manifests = SnapshotFile::new(settings.manifest_path());

        let reconciler = Arc::new(
            Reconciler::new(config.clone(), manifests, fetcher, sink)
                .with_timeouts(settings.fetch_timeout(), settings.send_timeout()),
        );
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&reconciler)));
        let router = CommandRouter::new(config.clone(), Arc::clone(&reconciler), Arc::clone(&scheduler));

        let current = config.get();
        if current.active {
            scheduler.start(current.interval).await?;
        }

        tracing::info!(
            data_dir = %settings.data_dir.display(),
            root = config.root(),
            active = current.active,
            "Stockwatch ready"
        );

        Ok(StockWatch {
            config,
            reconciler,
            scheduler,
            router,
        })
    }
}

impl Default for StockWatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http-fetch")]
fn default_fetcher(settings: &Settings) -> Result<Arc<dyn ProductFetcher>> {
    let fetcher = crate::fetch::HttpOfferFetcher::new(settings.fetch_timeout())?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "http-fetch"))]
fn default_fetcher(_settings: &Settings) -> Result<Arc<dyn ProductFetcher>> {
    Err(WatchError::SettingsError(
        "a product fetcher is required without the http-fetch feature".to_string(),
    ))
}
