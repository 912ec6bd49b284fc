//! Site initialization module.
//!
//! Writes a default `leadsite.toml` and creates the database schema.

use crate::{config::SiteConfig, log, store::SqliteStore};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore"];

/// Create a new site at the configured root.
pub fn new_site(config: &SiteConfig) -> Result<()> {
    let root = config.get_root();
    fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;

    init_default_config(&config.config_path)?;

    if let Some(parent) = config.store.path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteStore::open(&config.store.path)
        .with_context(|| format!("Failed to create database {}", config.store.path.display()))?;

    init_ignored_files(root, &config.store.path)?;

    log!("store"; "created {}", config.store.path.display());
    log!("init"; "next: `leadsite admin add <email> <password>`, then `leadsite serve`");
    Ok(())
}

/// Write default configuration file
fn init_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file `{}` already exists", path.display());
    }
    let content = toml::to_string_pretty(&SiteConfig::default())?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Ignore the database and its WAL side files.
fn init_ignored_files(root: &Path, db: &Path) -> Result<()> {
    let name = db
        .strip_prefix(root)
        .unwrap_or(db)
        .to_string_lossy()
        .into_owned();
    let content = format!("{name}\n{name}-wal\n{name}-shm\n");

    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DataStore, Table};

    fn config_in(root: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.set_root(root);
        config.config_path = root.join("leadsite.toml");
        config.store.path = root.join("leadsite.db");
        config
    }

    #[test]
    fn test_new_site_writes_config_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        new_site(&config).unwrap();

        let written = SiteConfig::from_path(&config.config_path).unwrap();
        assert_eq!(written.serve.port, 5277);

        let store = SqliteStore::open(&config.store.path).unwrap();
        assert!(store.read_rows(Table::Content, None).unwrap().is_empty());

        let ignore = fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(ignore.starts_with("leadsite.db\n"));
    }

    #[test]
    fn test_new_site_refuses_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.config_path, "").unwrap();
        assert!(new_site(&config).is_err());
    }
}
