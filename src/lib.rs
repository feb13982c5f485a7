//! # stockwatch
//!
//! Watches product pages for price and availability changes and notifies
//! channels when something moved.
//!
//! ## Overview
//!
//! `stockwatch` runs a periodic reconciliation cycle over a set of tracked
//! product pages:
//! - Fetch the current offer for every product
//! - Diff the result against the last persisted manifest
//! - Persist and broadcast a report when anything changed
//! - Send fetch, persistence and delivery failures to service channels
//!
//! Operators steer it with slash commands (`/add_product`, `/stop_updates`,
//! `/status`, ...). Only whitelisted operators are obeyed, and every change
//! is written through to disk so a restart resumes where it left off.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stockwatch::prelude::*;
//!
//! # async fn example() -> stockwatch::error::Result<()> {
//! let settings = Settings::loader()
//!     .with_file("config/stockwatch.yaml")
//!     .with_env_overrides("STOCKWATCH", "__")
//!     .load()?;
//!
//! let watch = StockWatch::builder()
//!     .with_settings(settings)
//!     .with_sink(TracingSink)
//!     .build()
//!     .await?;
//!
//! let request = CommandRequest::new(
//!     "@root",
//!     "@root",
//!     "/add_product sensor https://shop.example/sensor",
//! );
//! watch.handle(&request).await;
//!
//! // Lock-free read of the live configuration
//! println!("Tracking {} products", watch.config().get().products.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http-fetch` (default): [`HttpOfferFetcher`](fetch::HttpOfferFetcher),
//!   reading offers from the JSON-LD block of product pages with `reqwest`.

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod app;
pub mod commands;
pub mod core;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod settings;
pub mod sink;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::app::{StockWatch, StockWatchBuilder};
    pub use crate::commands::CommandRequest;
    pub use crate::core::{ConfigStore, Manifest, ServerConfig, Validate};
    pub use crate::error::{Result, ValidationError, WatchError};
    pub use crate::fetch::{Offer, ProductFetcher};
    pub use crate::settings::Settings;
    pub use crate::sink::{NotificationSink, TracingSink};

    #[cfg(feature = "http-fetch")]
    pub use crate::fetch::HttpOfferFetcher;
}
