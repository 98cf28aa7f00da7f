use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, parse_duration};
use crate::models::Id;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "BONDSTER_BCO_";

fn default_sync_rate() -> Duration {
    Duration::from_secs(22)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identity_file() -> PathBuf {
    PathBuf::from("identity.txt")
}

fn default_bondster_gateway() -> String {
    "https://bondster.com/ib".to_string()
}

fn default_vault_gateway() -> String {
    "https://127.0.0.1:4400".to_string()
}

fn default_ledger_gateway() -> String {
    "https://127.0.0.1:4401".to_string()
}

/// Base URLs of the remote services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bondster: String,
    pub vault: String,
    pub ledger: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bondster: default_bondster_gateway(),
            vault: default_vault_gateway(),
            ledger: default_ledger_gateway(),
        }
    }
}

/// Importer configuration as written in the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tenant whose ledger receives the imported transactions.
    pub tenant: String,

    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// age x25519 identity protecting the token records. Relative paths are
    /// resolved like `data_dir`.
    pub identity_file: PathBuf,

    /// Pause between two scheduler ticks.
    #[serde(deserialize_with = "deserialize_duration")]
    pub sync_rate: Duration,

    #[serde(deserialize_with = "deserialize_duration")]
    pub http_timeout: Duration,

    pub gateways: GatewayConfig,

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant: String::new(),
            data_dir: None,
            identity_file: default_identity_file(),
            sync_rate: default_sync_rate(),
            http_timeout: default_http_timeout(),
            gateways: GatewayConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `BONDSTER_BCO_*` overrides. `lookup` resolves a full variable
    /// name, normally to `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(tenant) = var("TENANT") {
            self.tenant = tenant;
        }
        if let Some(data_dir) = var("DATA_DIR") {
            self.data_dir = Some(PathBuf::from(data_dir));
        }
        if let Some(identity_file) = var("IDENTITY_FILE") {
            self.identity_file = PathBuf::from(identity_file);
        }
        if let Some(rate) = var("SYNC_RATE") {
            self.sync_rate =
                parse_duration(&rate).with_context(|| format!("Invalid {ENV_PREFIX}SYNC_RATE"))?;
        }
        if let Some(timeout) = var("HTTP_TIMEOUT") {
            self.http_timeout = parse_duration(&timeout)
                .with_context(|| format!("Invalid {ENV_PREFIX}HTTP_TIMEOUT"))?;
        }
        if let Some(url) = var("BONDSTER_GATEWAY") {
            self.gateways.bondster = url;
        }
        if let Some(url) = var("VAULT_GATEWAY") {
            self.gateways.vault = url;
        }
        if let Some(url) = var("LEDGER_GATEWAY") {
            self.gateways.ledger = url;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    fn resolve(path: &Path, config_dir: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) => Self::resolve(data_dir, config_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub tenant: String,
    pub data_dir: PathBuf,
    pub identity_file: PathBuf,
    pub sync_rate: Duration,
    pub http_timeout: Duration,
    pub gateways: GatewayConfig,
    pub log_level: String,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./bondster-import.toml` if it exists in current directory
/// 2. `~/.config/bondster-import/bondster-import.toml`
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("bondster-import.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir
            .join("bondster-import")
            .join("bondster-import.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load, apply environment overrides and resolve paths relative to the
    /// config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env<F>(config_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let mut config = Config::load(&config_path)?;
        config.apply_env(lookup)?;
        Self::from_config(config, config_dir)
    }

    pub fn from_config(config: Config, config_dir: &Path) -> Result<Self> {
        if config.tenant.is_empty() {
            bail!("No tenant configured (set `tenant` or {ENV_PREFIX}TENANT)");
        }
        if !Id::is_path_safe(&config.tenant) {
            bail!("Invalid tenant name: {:?}", config.tenant);
        }

        Ok(Self {
            data_dir: config.resolve_data_dir(config_dir),
            identity_file: Config::resolve(&config.identity_file, config_dir),
            tenant: config.tenant,
            sync_rate: config.sync_rate,
            http_timeout: config.http_timeout,
            gateways: config.gateways,
            log_level: config.log_level,
        })
    }

    fn storage_root(&self) -> PathBuf {
        self.data_dir
            .join(format!("t_{}", self.tenant))
            .join("import")
            .join("bondster")
    }

    /// Root of the age-encrypted token records.
    pub fn encrypted_root(&self) -> PathBuf {
        self.storage_root().join("encrypted")
    }

    /// Root of the plaintext statement store.
    pub fn plaintext_root(&self) -> PathBuf {
        self.storage_root().join("plaintext")
    }
}
