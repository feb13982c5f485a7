//! Crash-safe snapshot files.

use crate::error::{Result, WatchError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A single value persisted as JSON at a fixed path.
///
/// Writes go to a sibling temporary file that is synced and then renamed
/// over the target, so a crash mid-write leaves either the old or the new
/// snapshot on disk, never a partial one.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::core::{Manifest, SnapshotFile};
///
/// # fn example() -> stockwatch::error::Result<()> {
/// let file: SnapshotFile<Manifest> = SnapshotFile::new("/var/lib/stockwatch/last_manifest.json");
/// let previous = file.load()?.unwrap_or_default();
/// file.save(&previous)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SnapshotFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle for the snapshot at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot.
    ///
    /// A missing file is not an error and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(&self) -> Result<Option<T>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| WatchError::SnapshotError {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Overwrite the snapshot with `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the file cannot be
    /// written; the previous snapshot is left intact in that case.
    pub fn save(&self, value: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|source| WatchError::SnapshotError {
                path: self.path.display().to_string(),
                source,
            })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        let written = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Snapshot saved");
        Ok(())
    }

    /// Overwrite the snapshot with `value` on the blocking thread pool.
    ///
    /// Use this from async code; [`save`](Self::save) fsyncs and would
    /// stall the runtime worker otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save), plus an IO error if the blocking task
    /// panics or is cancelled.
    pub async fn persist(&self, value: T) -> Result<()>
    where
        T: Send + 'static,
    {
        let file = Self::new(self.path.clone());
        tokio::task::spawn_blocking(move || file.save(&value))
            .await
            .map_err(|e| WatchError::IoError(std::io::Error::other(e)))?
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
