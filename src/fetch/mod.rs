//! Retrieving current availability for tracked products.

#[cfg(feature = "http-fetch")]
mod http;

#[cfg(feature = "http-fetch")]
pub use http::HttpOfferFetcher;

use crate::core::{Availability, Manifest};
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// What a vendor page says about one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// Price in minor currency units (cents).
    pub price: u64,
    /// Stock status identifier, e.g. `https://schema.org/InStock`.
    pub tag: String,
    /// Currency code.
    pub currency: String,
}

impl Offer {
    fn into_availability(self, url: &str) -> Availability {
        Availability {
            price: self.price,
            tag: self.tag,
            url: url.to_string(),
            currency: self.currency,
        }
    }
}

/// Source of offers for product URLs.
///
/// Implement this to support a vendor. Failures are per URL and never
/// abort a reconciliation cycle.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    /// Fetch the current offer for one product page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be retrieved or yields no offer.
    async fn fetch(&self, url: &str) -> Result<Offer>;
}

/// Outcome of fetching every tracked product.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// One entry per tracked product; failures appear as "not found".
    pub manifest: Manifest,
    /// One error per product that could not be fetched.
    pub errors: Vec<WatchError>,
}

/// Fetch every product, giving each URL at most `timeout`.
///
/// A product whose page cannot be turned into an offer is recorded with an
/// empty tag and zero price, and contributes exactly one error. Errors are
/// collected; the remaining products are still fetched.
pub async fn fetch_all(
    fetcher: &dyn ProductFetcher,
    products: &BTreeMap<String, String>,
    timeout: Duration,
) -> FetchReport {
    let mut report = FetchReport::default();

    for (name, url) in products {
        tracing::debug!(product = %name, url = %url, "Fetching product");

        let result = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(WatchError::Timeout {
                operation: format!("Fetching {}", url),
                elapsed: timeout,
            }),
        };

        match result {
            Ok(offer) => report.manifest.insert(name, offer.into_availability(url)),
            Err(e) => {
                tracing::warn!(product = %name, error = %e, "Product not found");
                report.manifest.insert(name, Availability::not_found(url));
                report.errors.push(e);
            }
        }
    }

    report
}
