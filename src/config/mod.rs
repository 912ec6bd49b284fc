//! Site configuration management for `leadsite.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                      |
//! |-------------|----------------------------------------------|
//! | `[base]`    | Site identity (title, public url)            |
//! | `[serve]`   | HTTP server (interface, port)                |
//! | `[store]`   | Database path and store deadlines            |
//! | `[auth]`    | Session lifetime and password rules          |
//!
//! # Example
//!
//! ```toml
//! [base]
//! title = "Meeting Marketer Pro"
//! url = "https://meetingmanagerpro.com"
//!
//! [serve]
//! port = 5277
//!
//! [store]
//! path = "leadsite.db"
//! persist_timeout_ms = 5000
//!
//! [auth]
//! session_ttl_hours = 24
//! ```

mod auth;
mod base;
pub mod defaults;
mod error;
mod serve;
mod store;

use auth::AuthConfig;
use base::BaseConfig;
pub use error::ConfigError;
use serve::ServeConfig;
use store::StoreConfig;

use crate::{
    cli::{Cli, Commands},
    content::Timeouts,
};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing leadsite.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site root directory (set after loading)
    #[serde(skip)]
    pub root: Option<PathBuf>,

    /// Site identity
    #[serde(default)]
    pub base: BaseConfig,

    /// HTTP server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Database settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.root = Some(path.to_path_buf())
    }

    /// Where password reset links land.
    pub fn reset_redirect(&self) -> String {
        format!("{}/reset-password", self.base.url.trim_end_matches('/'))
    }

    /// Store deadlines for the content accessor.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            load: self.store.load_timeout(),
            persist: self.store.persist_timeout(),
        }
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        let root = Self::normalize_path(&root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(&cli.config));

        let expanded = shellexpand::tilde(&self.store.path.to_string_lossy()).into_owned();
        self.store.path = Self::normalize_path(&root.join(expanded));

        if let Commands::Serve {
            interface, port, ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate field values
    pub fn validate(&self) -> Result<()> {
        if !self.base.url.starts_with("http") {
            bail!(ConfigError::SiteUrl(self.base.url.clone()));
        }

        if self.store.load_timeout_ms == 0 {
            bail!(ConfigError::ZeroTimeout("load_timeout_ms"));
        }
        if self.store.persist_timeout_ms == 0 {
            bail!(ConfigError::ZeroTimeout("persist_timeout_ms"));
        }

        let min = defaults::auth::min_password_len();
        if self.auth.min_password_len < min {
            bail!(ConfigError::ShortPassword {
                got: self.auth.min_password_len,
                min,
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
