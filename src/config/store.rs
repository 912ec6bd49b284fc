//! `[store]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// `[store]` section in leadsite.toml - database location and deadlines.
///
/// # Example
/// ```toml
/// [store]
/// path = "~/sites/leads.db"
/// load_timeout_ms = 3000
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file, relative to the site root. `~` is expanded.
    #[serde(default = "defaults::store::path")]
    #[educe(Default = defaults::store::path())]
    pub path: PathBuf,

    /// Deadline for the initial content load before falling back to defaults.
    #[serde(default = "defaults::store::load_timeout_ms")]
    #[educe(Default = defaults::store::load_timeout_ms())]
    pub load_timeout_ms: u64,

    /// Deadline for each section write.
    #[serde(default = "defaults::store::persist_timeout_ms")]
    #[educe(Default = defaults::store::persist_timeout_ms())]
    pub persist_timeout_ms: u64,
}

impl StoreConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}
