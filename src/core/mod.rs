//! Core state: runtime configuration, manifests and their persistence.

mod config_store;
mod manifest;
mod server_config;
mod snapshot;
mod validation;

pub use config_store::{ConfigStore, Mutation};
pub use manifest::{Availability, Manifest};
pub use server_config::{
    ChannelKind, ChannelList, DEFAULT_INTERVAL, MAX_INTERVAL, ServerConfig, Whitelist, normalize_user,
};
pub use snapshot::SnapshotFile;
pub use validation::Validate;
