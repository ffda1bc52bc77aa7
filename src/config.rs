//! Configuration management for allowsync.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::document::{Family, TableSpec, DEFAULT_HASHSIZE, DEFAULT_MAXELEM};
use crate::enforcer::DEFAULT_IPSET_PATH;
use crate::validation::validate_url;

/// Overrides `api.url`
pub const ENV_API_URL: &str = "ALLOWSYNC_API_URL";
/// Overrides `api.nas_name`
pub const ENV_NAS_NAME: &str = "ALLOWSYNC_NAS_NAME";

pub const DEFAULT_CONFIG_PATH: &str = "/etc/allowsync/config.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Allow-list API
    pub api: ApiConfig,

    /// Directory holding the persisted command documents
    pub state_dir: PathBuf,

    /// Lock file preventing concurrent runs
    pub lock_file: PathBuf,

    /// Path to the ipset binary
    pub ipset_path: String,

    /// Sets to keep in sync
    pub tables: Vec<TableConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            state_dir: PathBuf::from("/var/lib/allowsync"),
            lock_file: PathBuf::from("/run/allowsync.lock"),
            ipset_path: DEFAULT_IPSET_PATH.to_string(),
            tables: vec![TableConfig::default()],
        }
    }
}

impl Config {
    /// Load configuration from YAML file, apply environment overrides and
    /// validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.apply_env_overrides(|name| env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from YAML without validating it.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides looked up through `lookup` (the process environment
    /// in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api.url = url;
        }
        if let Some(nas_name) = lookup(ENV_NAS_NAME).filter(|v| !v.is_empty()) {
            self.api.nas_name = Some(nas_name);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            anyhow::bail!("No tables configured");
        }

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }

        if self.ipset_path.trim().is_empty() {
            anyhow::bail!("ipset_path cannot be empty");
        }

        let mut seen = HashSet::new();
        for table in &self.tables {
            table.spec().validate()?;

            if !seen.insert(table.name.as_str()) {
                anyhow::bail!("Table '{}' is configured more than once", table.name);
            }

            let url = self.endpoint_for(table);
            if url.is_empty() {
                anyhow::bail!(
                    "Table '{}' has no URL: set api.url, tables[].url or {}",
                    table.name,
                    ENV_API_URL
                );
            }
            let plain_http = validate_url(url)
                .with_context(|| format!("Invalid URL for table '{}'", table.name))?;
            if plain_http {
                warn!(table = %table.name, "Fetching over plain HTTP: {}", url);
            }
        }

        Ok(())
    }

    /// URL the members of `table` are fetched from.
    pub fn endpoint_for<'a>(&'a self, table: &'a TableConfig) -> &'a str {
        table.url.as_deref().unwrap_or(&self.api.url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Endpoint returning the member list (JSON array of addresses)
    pub url: String,

    /// Value of the `nas_name` query parameter; defaults to the hostname
    pub nas_name: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (self-signed internal APIs)
    pub accept_invalid_certs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            nas_name: None,
            timeout_secs: 10,
            accept_invalid_certs: false,
        }
    }
}

impl ApiConfig {
    /// Effective `nas_name`: configured value, else the system hostname.
    pub fn effective_nas_name(&self) -> Option<String> {
        self.nas_name.clone().or_else(system_hostname)
    }
}

/// One synchronized set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Live ipset name
    pub name: String,
    pub hashsize: u32,
    pub maxelem: u32,
    pub family: Family,
    /// Load an empty list instead of refusing it
    pub allow_empty: bool,
    /// Per-table endpoint, overrides `api.url`
    pub url: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "allow_smtp".to_string(),
            hashsize: DEFAULT_HASHSIZE,
            maxelem: DEFAULT_MAXELEM,
            family: Family::Inet,
            allow_empty: false,
            url: None,
        }
    }
}

impl TableConfig {
    pub fn spec(&self) -> TableSpec {
        TableSpec::new(self.name.clone())
            .with_sizing(self.hashsize, self.maxelem)
            .with_family(self.family)
            .with_allow_empty(self.allow_empty)
    }
}

/// Hostname of this machine, used as the default `nas_name`.
fn system_hostname() -> Option<String> {
    let mut buf = [0u8; 256];

    // SAFETY: the pointer and length describe a writable buffer we own.
    // gethostname writes at most `len` bytes and has no other side effects.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec())
        .ok()
        .filter(|name| !name.is_empty())
}

/// Sample configuration shipped with the project.
pub fn example_yaml() -> &'static str {
    include_str!("../templates/config.yaml")
}
