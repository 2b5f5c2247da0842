pub mod config;
pub mod incident;
pub mod init;
pub mod runbook;
pub mod severity;

use anyhow::Context;
use incident_core::config::Config;
use incident_core::store::YamlStore;
use incident_core::IncidentDesk;
use std::path::Path;
use std::sync::Arc;

/// Load config and open a desk backed by the project's incident store.
pub fn open_desk(root: &Path) -> anyhow::Result<(Config, IncidentDesk)> {
    let config = Config::load(root).context("failed to load config")?;
    let services = config
        .services(root)
        .context("failed to build services from config")?;
    let desk = IncidentDesk::new(Arc::new(services)).with_store(YamlStore::new(root));
    Ok((config, desk))
}

/// `--actor` wins, then the configured default actor.
pub fn actor(explicit: Option<&str>, config: &Config) -> String {
    explicit
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(config.default_actor.as_str())
        .to_string()
}
