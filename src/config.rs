use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("ksvc"))
}

/// Default location of the object store
fn default_store_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("ksvc").display().to_string())
        .unwrap_or_else(|| "~/.local/share/ksvc".to_string())
}

fn default_keystone_api_name() -> String {
    "keystone".to_string()
}

const fn default_bootstrap_requeue_secs() -> u64 {
    5
}

const fn default_resync_secs() -> u64 {
    60
}

const fn default_poll_secs() -> u64 {
    2
}

const fn default_http_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Root of the file store (`~` is expanded)
    pub store_dir: String,
    /// Only reconcile services in this namespace
    pub namespace: Option<String>,
    /// Name of the KeystoneAPI object in each namespace
    pub keystone_api_name: String,
    pub bootstrap_requeue_secs: u64,
    /// Re-run converged services this often
    pub resync_secs: u64,
    /// How often the controller looks for new or due services
    pub poll_secs: u64,
    pub http_timeout_secs: u64,
    pub backoff: BackoffConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            namespace: None,
            keystone_api_name: default_keystone_api_name(),
            bootstrap_requeue_secs: default_bootstrap_requeue_secs(),
            resync_secs: default_resync_secs(),
            poll_secs: default_poll_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load config from `path`, or from the default location
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Get expanded store directory path
    pub fn store_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.store_dir);
        PathBuf::from(expanded.as_ref())
    }

    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_secs(self.bootstrap_requeue_secs)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Backoff after failed reconciliations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_secs: u64,
    /// Multiplier for exponential backoff
    pub factor: f64,
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_secs: 5,
            factor: 2.0,
            max_secs: 300,
        }
    }
}

impl BackoffConfig {
    /// Delay after the given number of consecutive failures (1-based)
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let delay = self.base_secs as f64 * self.factor.powi(exponent);
        let capped = delay.min(self.max_secs as f64).max(0.0);
        // u64::MAX as f64 rounds past the largest Duration
        Duration::try_from_secs_f64(capped).unwrap_or(Duration::from_secs(self.max_secs))
    }
}
