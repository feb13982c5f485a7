//! Point-in-time product availability and its rendering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Availability of one product at one point in time.
///
/// An empty `tag` means the product page yielded no data ("not found").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Price in minor currency units (cents).
    pub price: u64,
    /// Stock status identifier, usually a schema.org URL such as
    /// `https://schema.org/InStock`.
    pub tag: String,
    /// Source URL of the product page.
    pub url: String,
    /// Currency code, e.g. `EUR`.
    pub currency: String,
}

impl Availability {
    /// The entry recorded for a product whose page yielded no data.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Whether this entry is a "not found" placeholder.
    pub fn is_not_found(&self) -> bool {
        self.tag.is_empty()
    }

    /// The last path segment of the tag, e.g. `InStock`.
    pub fn label(&self) -> &str {
        self.tag.rsplit('/').next().unwrap_or(&self.tag)
    }

    /// Status icon derived from the tag.
    pub fn icon(&self) -> &'static str {
        if self.tag.is_empty() {
            return "❌";
        }
        match self.label() {
            "OutOfStock" => "❌",
            "InStock" => "✅",
            _ => "⚠️",
        }
    }

    /// The price formatted with two decimals, e.g. `1.50`.
    pub fn display_price(&self) -> String {
        format!("{}.{:02}", self.price / 100, self.price % 100)
    }
}

/// Mapping from product name to its observed availability.
///
/// Two manifests are equal iff they have the same products with identical
/// availability; that equality is the only change-detection signal. An
/// absent snapshot is represented by the empty manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, Availability>);

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the availability of a product, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, availability: Availability) {
        self.0.insert(name.into(), availability);
    }

    /// Look up a product.
    pub fn get(&self, name: &str) -> Option<&Availability> {
        self.0.get(name)
    }

    /// Products in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Availability)> {
        self.0.iter().map(|(name, a)| (name.as_str(), a))
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the manifest has no products.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the human-readable report sent to notify channels.
    ///
    /// Entries are sorted by product name. Each entry is a status line
    /// followed by the source URL, separated from the next by a blank line.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stockwatch::core::{Availability, Manifest};
    ///
    /// let mut manifest = Manifest::new();
    /// manifest.insert(
    ///     "sensor",
    ///     Availability {
    ///         price: 150,
    ///         tag: "https://schema.org/InStock".into(),
    ///         url: "https://shop.example/sensor".into(),
    ///         currency: "EUR".into(),
    ///     },
    /// );
    ///
    /// assert_eq!(
    ///     manifest.render(),
    ///     "- ✅ sensor: InStock @ 1.50 EUR\nhttps://shop.example/sensor"
    /// );
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (name, a) in self.iter() {
            if a.is_not_found() {
                let _ = write!(out, "- ❌ {}: not found\n{}\n\n", name, a.url);
            } else {
                let _ = write!(
                    out,
                    "- {} {}: {} @ {} {}\n{}\n\n",
                    a.icon(),
                    name,
                    a.label(),
                    a.display_price(),
                    a.currency,
                    a.url
                );
            }
        }

        out.trim_end().to_string()
    }
}

impl FromIterator<(String, Availability)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, Availability)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
