//! Run command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::enforcer::{check_root, IpsetBackend};
use crate::fetcher::Fetcher;
use crate::lock::LockGuard;
use crate::runner::{run_tables, RunReport};
use crate::store::DocumentStore;
use crate::sync::SetSynchronizer;

/// Run the synchronization once.
///
/// `Err` is reserved for failures before any table could be processed
/// (privileges, config, lock, state directory, HTTP client). Per-table
/// failures are part of the returned report.
pub async fn run(config_path: &Path) -> Result<RunReport> {
    check_root()?;

    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let lock = LockGuard::acquire(&config.lock_file)?;
    debug!("Holding lock {:?}", lock.path());

    info!("Synchronizing {} table(s)...", config.tables.len());

    let store = DocumentStore::new(&config.state_dir);
    store
        .ensure_dir()
        .with_context(|| format!("Failed to create state directory {:?}", store.dir()))?;

    let fetcher = Fetcher::new(&config.api)?;
    if let Some(nas_name) = fetcher.nas_name() {
        info!("Requesting allow-lists for nas_name={}", nas_name);
    }

    let backend = IpsetBackend::new(config.ipset_path.as_str());
    debug!("Applying sets with {}", backend.program());
    let synchronizer = SetSynchronizer::new(backend, store);

    Ok(run_tables(&config, &fetcher, &synchronizer).await)
}
