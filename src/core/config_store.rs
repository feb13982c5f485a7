//! Guarded, write-through access to the runtime configuration.

use crate::core::{ServerConfig, SnapshotFile, Validate, normalize_user};
use crate::error::{Result, ValidationError, WatchError};
use arc_swap::ArcSwap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a [`ConfigStore::mutate_and_save`] call that passed validation.
#[derive(Debug)]
pub struct Mutation<R> {
    /// Whatever the mutating closure returned.
    pub outcome: R,
    /// Whether the closure changed the configuration. Unchanged
    /// configurations are not persisted.
    pub changed: bool,
    /// Set when the change was applied in memory but could not be written
    /// to disk.
    pub save_error: Option<WatchError>,
}

/// Owner of the single live [`ServerConfig`].
///
/// Reads are lock-free snapshots served from an `ArcSwap`. Every write goes
/// through [`mutate_and_save`](Self::mutate_and_save) (or
/// [`save`](Self::save)), which serializes writers and persists the result
/// before returning. Cloning the store yields another handle to the same
/// configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::core::ConfigStore;
///
/// # async fn example() -> stockwatch::error::Result<()> {
/// let store = ConfigStore::open("/var/lib/stockwatch/config.json", "@root")?;
///
/// let mutation = store
///     .mutate_and_save(|cfg| cfg.notify_channels.insert("@deals"))
///     .await?;
/// assert!(mutation.outcome);
///
/// println!("Channels: {}", store.get().notify_channels.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigStore {
    /// The current configuration, wrapped in ArcSwap for atomic updates
    current: Arc<ArcSwap<ServerConfig>>,
    /// Serializes writers so read-modify-write cycles never interleave
    writer: Arc<Mutex<()>>,
    file: Arc<SnapshotFile<ServerConfig>>,
    root: Arc<str>,
}

impl ConfigStore {
    /// Open the store backed by the snapshot at `path`.
    ///
    /// A missing snapshot yields the default configuration (root-only
    /// whitelist, no channels or products, active, hourly checks).
    ///
    /// # Errors
    ///
    /// Returns an error if the root identifier is empty, or the snapshot
    /// exists but cannot be read, decoded or validated.
    pub fn open(path: impl Into<PathBuf>, root: &str) -> Result<Self> {
        let root = normalize_user(root)
            .ok_or_else(|| ValidationError::invalid_field("root_user", "must not be empty"))?;

        let file = SnapshotFile::new(path);
        let initial = read_snapshot(&file, &root)?;

        tracing::info!(
            path = %file.path().display(),
            products = initial.products.len(),
            active = initial.active,
            "Configuration loaded"
        );

        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
            writer: Arc::new(Mutex::new(())),
            file: Arc::new(file),
            root: root.into(),
        })
    }

    /// Get a reference-counted handle to the current configuration.
    ///
    /// Readers never block writers or other readers.
    pub fn get(&self) -> Arc<ServerConfig> {
        self.current.load_full()
    }

    /// The designated root operator, in `@name` form.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Read the persisted snapshot from disk, bypassing the in-memory copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read or decoded.
    pub fn load(&self) -> Result<ServerConfig> {
        read_snapshot(&self.file, &self.root)
    }

    /// Replace the whole configuration and persist it.
    ///
    /// # Errors
    ///
    /// Returns a validation error (nothing applied) or the persistence error
    /// (the new configuration is live in memory regardless).
    pub async fn save(&self, config: ServerConfig) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.check(&config)?;
        self.current.store(Arc::new(config.clone()));
        self.file.persist(config).await
    }

    /// Apply `f` under mutual exclusion with every other writer, then
    /// persist the result.
    ///
    /// If `f` leaves the configuration unchanged nothing is written. If the
    /// result fails validation, the previous configuration is retained.
    ///
    /// # Errors
    ///
    /// Returns an error only when validation fails. A persistence failure is
    /// reported through [`Mutation::save_error`], since the change is
    /// already live in memory.
    pub async fn mutate_and_save<F, R>(&self, f: F) -> Result<Mutation<R>>
    where
        F: FnOnce(&mut ServerConfig) -> R,
    {
        let _guard = self.writer.lock().await;

        let current = self.current.load_full();
        let mut next = ServerConfig::clone(&current);
        let outcome = f(&mut next);

        if next == *current {
            return Ok(Mutation {
                outcome,
                changed: false,
                save_error: None,
            });
        }

        self.check(&next)?;

        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));

        let save_error = self.file.persist(ServerConfig::clone(&next)).await.err();
        match &save_error {
            None => tracing::info!("Configuration updated"),
            Some(e) => tracing::error!(error = %e, "Configuration updated but not saved"),
        }

        Ok(Mutation {
            outcome,
            changed: true,
            save_error,
        })
    }

    fn check(&self, config: &ServerConfig) -> Result<()> {
        config.validate()?;
        if !config.whitelist.contains(&self.root) {
            return Err(
                ValidationError::invalid_field("whitelist", "the root user cannot be removed")
                    .into(),
            );
        }
        Ok(())
    }
}

fn read_snapshot(file: &SnapshotFile<ServerConfig>, root: &str) -> Result<ServerConfig> {
    let mut config = file
        .load()?
        .unwrap_or_else(|| ServerConfig::new(root.to_string()));
    config.whitelist.insert(root.to_string());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(temp_dir: &TempDir) -> ConfigStore {
        ConfigStore::open(temp_dir.path().join("config.json"), "root").unwrap()
    }

    #[tokio::test]
    async fn test_missing_snapshot_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let cfg = store.get();
        assert_eq!(*cfg, ServerConfig::new("@root"));
        assert_eq!(store.root(), "@root");
        assert!(!temp_dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_mutation_round_trips_through_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let mutation = store
            .mutate_and_save(|cfg| {
                cfg.products
                    .insert("sensor".to_string(), "https://shop.example/s".to_string());
                cfg.interval = Duration::from_secs(30 * 60);
            })
            .await
            .unwrap();
        assert!(mutation.changed);
        assert!(mutation.save_error.is_none());

        assert_eq!(store.load().unwrap(), *store.get());

        let reopened = open(&temp_dir);
        assert_eq!(*reopened.get(), *store.get());
    }

    #[tokio::test]
    async fn test_unchanged_mutation_is_not_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let mutation = store
            .mutate_and_save(|cfg| cfg.whitelist.insert("@root"))
            .await
            .unwrap();

        assert!(!mutation.changed);
        assert!(!mutation.outcome);
        assert!(!temp_dir.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_mutation_keeps_old_config() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let result = store
            .mutate_and_save(|cfg| cfg.interval = Duration::ZERO)
            .await;
        assert!(result.is_err());
        assert_eq!(store.get().interval, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_root_cannot_be_removed_through_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let result = store
            .mutate_and_save(|cfg| cfg.whitelist.remove("@root"))
            .await;
        assert!(result.is_err());
        assert!(store.get().whitelist.contains("@root"));
    }

    #[tokio::test]
    async fn test_root_is_restored_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut config = ServerConfig::new("@someone");
        config.whitelist.insert("@other");
        SnapshotFile::new(&path).save(&config).unwrap();

        let store = ConfigStore::open(&path, "@root").unwrap();
        assert!(store.get().whitelist.contains("@root"));
        assert!(store.get().whitelist.contains("@other"));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_do_not_lose_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mutate_and_save(move |cfg| cfg.notify_channels.insert(format!("chan-{}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get().notify_channels.len(), 16);
        assert_eq!(store.load().unwrap().notify_channels.len(), 16);
    }

    #[tokio::test]
    async fn test_empty_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ConfigStore::open(temp_dir.path().join("config.json"), " @ ").is_err());
    }
}
