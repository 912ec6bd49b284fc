//! Leadsite - a lead-generation marketing site with inline content editing.

mod auth;
mod cli;
mod config;
mod contact;
mod content;
mod init;
mod logger;
mod render;
mod serve;
mod store;

use anyhow::{Context, Result, bail};
use auth::{AuthProvider, LocalAuth, LogMailer, add_admin};
use clap::Parser;
use cli::{AdminAction, Cli, Commands};
use config::SiteConfig;
use content::{ContentContext, ContentStore, LogSink, seed_tree};
use init::new_site;
use serve::{App, serve_site};
use std::{path::Path, sync::Arc};
use store::{DataStore, MemoryStore, SqliteStore};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static SiteConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Init => new_site(config),
        Commands::Serve { memory, .. } => serve(config, *memory),
        Commands::Dump => dump(config),
        Commands::Admin {
            action: AdminAction::Add { email, password },
        } => add_admin_user(config, email, password),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        SiteConfig::from_path(&config_path)?
    } else {
        SiteConfig::default()
    };
    config.update_with_cli(cli);

    let config_exists = config.config_path.exists();
    match (cli.is_init(), config_exists) {
        (true, true) => {
            bail!("Config file already exists. Remove it manually or init in a different path.")
        }
        (false, false) => bail!("Config file not found. Run `leadsite init` first."),
        _ => {}
    }

    config.validate()?;
    Ok(config)
}

fn runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .thread_name("leadsite-store")
        .build()
        .context("Failed to start async runtime")
}

fn open_store(config: &SiteConfig) -> Result<Arc<dyn DataStore>> {
    let path = &config.store.path;
    let store = SqliteStore::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn serve(config: &'static SiteConfig, memory: bool) -> Result<()> {
    let rt = runtime()?;
    let store: Arc<dyn DataStore> = if memory {
        log!("store"; "in-memory store, nothing is kept after exit");
        Arc::new(MemoryStore::new())
    } else {
        open_store(config)?
    };

    let accessor = ContentStore::new(
        Arc::clone(&store),
        Arc::new(LogSink),
        rt.handle().clone(),
        config.timeouts(),
    );
    let content = ContentContext::new(accessor, seed_tree());
    content.activate();

    let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuth::new(
        Arc::clone(&store),
        Arc::new(LogMailer),
        config.auth.policy(),
    ));

    let app = App {
        config,
        content,
        auth,
        store,
    };
    serve_site(&app)
}

/// Print the live content tree.
fn dump(config: &SiteConfig) -> Result<()> {
    let rt = runtime()?;
    let accessor = ContentStore::new(
        open_store(config)?,
        Arc::new(LogSink),
        rt.handle().clone(),
        config.timeouts(),
    );
    let tree = rt.block_on(accessor.load_all(seed_tree()));
    println!("{}", serde_json::to_string_pretty(&tree.to_json())?);
    Ok(())
}

fn add_admin_user(config: &SiteConfig, email: &str, password: &str) -> Result<()> {
    let store = open_store(config)?;
    let auth = LocalAuth::new(Arc::clone(&store), Arc::new(LogMailer), config.auth.policy());
    auth.create_user(email, password)?;
    add_admin(store.as_ref(), email)?;
    log!("auth"; "{} can now sign in at /admin-login", email.trim());
    Ok(())
}
