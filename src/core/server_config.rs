//! Runtime configuration mutated by operator commands.

use crate::core::Validate;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Polling interval used when no snapshot exists yet.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Longest accepted polling interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Normalize an operator identifier to its `@name` form.
///
/// Returns `None` when nothing but whitespace or `@` was given.
///
/// # Examples
///
/// ```rust
/// use stockwatch::core::normalize_user;
///
/// assert_eq!(normalize_user(" bob "), Some("@bob".to_string()));
/// assert_eq!(normalize_user("@bob"), Some("@bob".to_string()));
/// assert_eq!(normalize_user("@"), None);
/// ```
pub fn normalize_user(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@');
    if name.is_empty() {
        None
    } else {
        Some(format!("@{}", name))
    }
}

/// Set of operators allowed to issue commands.
///
/// Iteration is sorted, so listings are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist(BTreeSet<String>);

impl Whitelist {
    /// Create a whitelist holding only the root operator.
    pub fn with_root(root: impl Into<String>) -> Self {
        let mut users = BTreeSet::new();
        users.insert(root.into());
        Self(users)
    }

    /// Whether the operator is whitelisted.
    pub fn contains(&self, user: &str) -> bool {
        self.0.contains(user)
    }

    /// Add an operator. Returns `false` if already present.
    pub fn insert(&mut self, user: impl Into<String>) -> bool {
        self.0.insert(user.into())
    }

    /// Remove an operator. Returns `false` if it was not a member.
    pub fn remove(&mut self, user: &str) -> bool {
        self.0.remove(user)
    }

    /// Operators in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of operators.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the whitelist is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered list of channel identifiers without duplicates.
///
/// Removal preserves the relative order of the remaining channels, so
/// broadcasts keep reaching channels in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelList(Vec<String>);

impl ChannelList {
    /// Append a channel. Returns `false` if it is already listed.
    pub fn insert(&mut self, channel: impl Into<String>) -> bool {
        let channel = channel.into();
        if self.contains(&channel) {
            return false;
        }
        self.0.push(channel);
        true
    }

    /// Remove a channel. Returns `false` if it was not listed.
    pub fn remove(&mut self, channel: &str) -> bool {
        match self.0.iter().position(|c| c == channel) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether the channel is listed.
    pub fn contains(&self, channel: &str) -> bool {
        self.0.iter().any(|c| c == channel)
    }

    /// Channels in insertion order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// A sorted copy for display; the stored order is left untouched.
    pub fn sorted(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.0.iter().map(String::as_str).collect();
        channels.sort_unstable();
        channels
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no channel is listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ChannelList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = ChannelList::default();
        for channel in iter {
            list.insert(channel);
        }
        list
    }
}

/// Which of the two channel lists a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Receives product reports.
    Notify,
    /// Receives operational alerts.
    Service,
}

/// The mutable runtime configuration.
///
/// A single instance lives for the whole process inside the
/// [`ConfigStore`](crate::core::ConfigStore); every change is written
/// through to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Operators allowed to issue commands.
    pub whitelist: Whitelist,
    /// Channels that receive product reports.
    pub notify_channels: ChannelList,
    /// Channels that receive service alerts.
    pub service_channels: ChannelList,
    /// Tracked products, name to source URL.
    pub products: BTreeMap<String, String>,
    /// Whether the scheduler should be running.
    pub active: bool,
    /// Time between scheduled checks.
    #[serde(rename = "interval_secs", with = "duration_secs")]
    pub interval: Duration,
}

impl ServerConfig {
    /// The configuration used when no snapshot exists yet.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            whitelist: Whitelist::with_root(root),
            notify_channels: ChannelList::default(),
            service_channels: ChannelList::default(),
            products: BTreeMap::new(),
            active: true,
            interval: DEFAULT_INTERVAL,
        }
    }

    /// The channel list of the given kind.
    pub fn channels(&self, kind: ChannelKind) -> &ChannelList {
        match kind {
            ChannelKind::Notify => &self.notify_channels,
            ChannelKind::Service => &self.service_channels,
        }
    }

    /// Mutable access to the channel list of the given kind.
    pub fn channels_mut(&mut self, kind: ChannelKind) -> &mut ChannelList {
        match kind {
            ChannelKind::Notify => &mut self.notify_channels,
            ChannelKind::Service => &mut self.service_channels,
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.interval.is_zero() {
            errors.push(ValidationError::invalid_field(
                "interval",
                "must be greater than 0",
            ));
        } else if self.interval > MAX_INTERVAL {
            errors.push(ValidationError::invalid_field(
                "interval",
                "must be at most 366 days",
            ));
        }

        if self.whitelist.is_empty() {
            errors.push(ValidationError::invalid_field(
                "whitelist",
                "must contain at least the root user",
            ));
        }

        ValidationError::collect(errors)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
