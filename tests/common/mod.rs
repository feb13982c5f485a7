//! Shared doubles for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use stockwatch::prelude::*;
use tempfile::TempDir;

/// Fetcher answering from a script that tests can change between cycles.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    offers: Arc<Mutex<HashMap<String, Offer>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Arc<Mutex<Duration>>,
}

impl ScriptedFetcher {
    pub fn set(&self, url: &str, price: u64, tag: &str) {
        self.offers.lock().insert(
            url.to_string(),
            Offer {
                price,
                tag: tag.to_string(),
                currency: "EUR".to_string(),
            },
        );
    }

    pub fn fail(&self, url: &str) {
        self.offers.lock().remove(url);
    }

    /// Make every fetch take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ProductFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Offer> {
        self.calls.lock().push(url.to_string());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.offers
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| WatchError::fetch(url, "no offer in page"))
    }
}

/// Sink recording every delivered message; listed channels reject delivery.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl RecordingSink {
    pub fn break_channel(&self, channel: &str) {
        self.broken.lock().insert(channel.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_to(&self, channel: &str) -> Option<String> {
        self.sent_to(channel).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        if self.broken.lock().contains(channel) {
            return Err(WatchError::delivery(channel, "chat not found"));
        }
        self.sent.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

pub const ROOT: &str = "@root";

/// A watcher over a temporary data directory.
pub struct Harness {
    pub dir: TempDir,
    pub fetcher: ScriptedFetcher,
    pub sink: RecordingSink,
    pub watch: StockWatch,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self::in_dir(dir).await
    }

    pub async fn in_dir(dir: TempDir) -> Self {
        let fetcher = ScriptedFetcher::default();
        let sink = RecordingSink::default();
        let watch = StockWatch::builder()
            .with_settings(Settings::new(dir.path(), "root"))
            .with_fetcher(fetcher.clone())
            .with_sink(sink.clone())
            .build()
            .await
            .unwrap();

        Self {
            dir,
            fetcher,
            sink,
            watch,
        }
    }

    /// Send `text` as `user` from their private chat, and return the reply.
    pub async fn command(&self, user: &str, text: &str) -> Option<String> {
        let before = self.sink.sent_to(user).len();
        self.watch
            .handle(&CommandRequest::new(user, user, text))
            .await;
        self.sink.sent_to(user).get(before..).and_then(|r| r.last().cloned())
    }

    /// Send `text` as root and return the reply.
    pub async fn root(&self, text: &str) -> String {
        self.command(ROOT, text).await.unwrap_or_default()
    }

    pub fn config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("config.json")
    }

    pub fn manifest_path(&self) -> std::path::PathBuf {
        self.dir.path().join("last_manifest.json")
    }
}
