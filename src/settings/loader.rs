//! Builder that merges settings sources.

use super::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS, Settings, default_data_dir};
use crate::core::Validate;
use crate::error::{Result, WatchError};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

/// Loads [`Settings`] with standard precedence: built-in defaults, then
/// files in the order they were added, then environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::settings::Settings;
///
/// # fn example() -> stockwatch::error::Result<()> {
/// // STOCKWATCH_ROOT_USER=@alice overrides the file
/// let settings = Settings::loader()
///     .with_file("config/stockwatch.toml")
///     .with_env_overrides("STOCKWATCH", "__")
///     .load()?;
/// println!("State lives in {}", settings.data_dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SettingsLoader {
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl SettingsLoader {
    /// Create a loader with no sources besides the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settings file.
    ///
    /// Supported formats: YAML (.yaml, .yml), TOML (.toml), JSON (.json).
    /// Later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Read environment variables such as `STOCKWATCH_ROOT_USER`.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "STOCKWATCH")
    /// * `separator` - Separator for nested keys (e.g., "__")
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Replace a built-in default. Files and environment still win.
    pub fn with_default(mut self, key: &str, value: impl Into<String>) -> Self {
        self.defaults.push((key.to_string(), value.into()));
        self
    }

    /// Set a value that wins over every other source.
    pub fn with_override(mut self, key: &str, value: impl Into<String>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Merge all sources and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A file has an unsupported extension or cannot be parsed
    /// - `root_user` is not set by any source
    /// - The merged settings fail validation
    pub fn load(self) -> Result<Settings> {
        let mut builder = Config::builder()
            .set_default("data_dir", default_data_dir().to_string_lossy().to_string())?
            .set_default("fetch_timeout_secs", DEFAULT_FETCH_TIMEOUT_SECS as i64)?
            .set_default("send_timeout_secs", DEFAULT_SEND_TIMEOUT_SECS as i64)?;

        for (key, value) in self.defaults {
            builder = builder.set_default(key, value)?;
        }

        for path in &self.file_paths {
            validate_extension(path)?;
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        if let (Some(prefix), Some(separator)) = (&self.env_prefix, &self.env_separator) {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator(separator)
                    .try_parsing(true),
            );
        }

        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            data_dir = %settings.data_dir.display(),
            root_user = %settings.root_user,
            "Settings loaded"
        );

        Ok(settings)
    }
}

fn validate_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| {
            WatchError::SettingsError(format!(
                "Unable to determine file format for: {}",
                path.display()
            ))
        })?;

    match extension {
        "yaml" | "yml" | "toml" | "json" => Ok(()),
        _ => Err(WatchError::SettingsError(format!(
            "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
            extension
        ))),
    }
}
