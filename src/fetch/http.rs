//! Fetcher reading schema.org offers embedded in vendor pages.

use super::{Offer, ProductFetcher};
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

const LD_JSON_OPEN: &str = r#"<script type="application/ld+json">"#;
const SCRIPT_CLOSE: &str = "</script>";

/// Fetches product pages over HTTP and reads the first JSON-LD `offers`
/// record found on the page.
///
/// # Examples
///
/// ```rust,no_run
/// use stockwatch::fetch::{HttpOfferFetcher, ProductFetcher};
/// use std::time::Duration;
///
/// # async fn example() -> stockwatch::error::Result<()> {
/// let fetcher = HttpOfferFetcher::new(Duration::from_secs(10))?;
/// let offer = fetcher.fetch("https://shop.example/sensor").await?;
/// println!("{} {}", offer.price, offer.currency);
/// # Ok(())
/// # }
/// ```
pub struct HttpOfferFetcher {
    client: Client,
}

impl HttpOfferFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::fetch("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProductFetcher for HttpOfferFetcher {
    async fn fetch(&self, url: &str) -> Result<Offer> {
        tracing::debug!(url = %url, "Visiting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WatchError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::fetch(
                url,
                format!("HTTP status {}", status),
            ));
        }

        let body = response.text().await.map_err(|e| WatchError::fetch(url, e))?;
        extract_offer(&body).map_err(|reason| WatchError::fetch(url, reason))
    }
}

/// Find the first JSON-LD block on the page that carries an offer.
fn extract_offer(html: &str) -> std::result::Result<Offer, String> {
    let mut last_error = "no JSON-LD data on page".to_string();

    for block in ld_json_blocks(html) {
        let value: JsonValue = match serde_json::from_str(block.trim()) {
            Ok(value) => value,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        match offer_from_value(&value) {
            Some(offer) => return Ok(offer),
            None => last_error = "empty data".to_string(),
        }
    }

    Err(last_error)
}

fn ld_json_blocks(html: &str) -> impl Iterator<Item = &str> {
    html.split(LD_JSON_OPEN)
        .skip(1)
        .filter_map(|rest| rest.split(SCRIPT_CLOSE).next())
}

fn offer_from_value(value: &JsonValue) -> Option<Offer> {
    match value {
        JsonValue::Array(items) => items.iter().find_map(offer_from_value),
        JsonValue::Object(map) => {
            let offers = map.get("offers")?;
            let offer = match offers {
                JsonValue::Array(list) => list.first()?,
                other => other,
            };

            let price = match offer.get("price")? {
                JsonValue::Number(n) => n.as_f64()?,
                JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };

            Some(Offer {
                price: (price * 100.0).round().max(0.0) as u64,
                tag: offer.get("availability")?.as_str()?.to_string(),
                currency: offer
                    .get("priceCurrency")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        }
        _ => None,
    }
}
