//! Configuration of the extension subsystem and of the bots using it.
//!
//! Both files are TOML. Every directory is derived from a single data root
//! unless configured explicitly:
//!
//! ```text
//! {data_root}/extensions/          packages searched by the local finders
//! {data_root}/data/extensions/     extension data folders
//! {data_root}/data/unpacked/       unpacked package archives
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use scalabot_extension_sdk::{BotContext, ProxyConfig};

use crate::extension::finder::RemoteRepository;
use crate::extension::ExtensionCoordinate;

/// Environment variable names.
pub mod env_vars {
    /// Overrides the data root.
    pub const DATA_ROOT: &str = "SCALABOT_DATA";
    /// Overrides the extensions directory.
    pub const EXTENSIONS_DIR: &str = "SCALABOT_EXTENSIONS_DIR";
    /// `true` switches log output to JSON.
    pub const LOG_JSON: &str = "SCALABOT_LOG_JSON";
}

/// Paths relative to the data root.
pub mod paths {
    pub const EXTENSIONS: &str = "extensions";
    pub const DATA_EXTENSIONS: &str = "data/extensions";
    pub const UNPACKED: &str = "data/unpacked";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid bot account {name}: {reason}")]
    InvalidAccount { name: String, reason: String },
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Host-wide settings of the extension subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub data_root: PathBuf,
    pub extensions_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub unpack_dir: Option<PathBuf>,
    /// Remote repositories, searched in order.
    pub repositories: Vec<RemoteRepository>,
    /// Local Maven repository; `~/.m2/repository` when unset.
    pub local_repository: Option<PathBuf>,
    /// Proxy used by bots and repositories without one of their own.
    pub proxy: ProxyConfig,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            extensions_dir: None,
            data_dir: None,
            unpack_dir: None,
            repositories: Vec::new(),
            local_repository: None,
            proxy: ProxyConfig::default(),
        }
    }
}

impl ExtensionsConfig {
    /// Defaults rooted at `data_root`.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_toml_str(&read_file(path)?)?;
        config.apply_env_overrides();
        debug!(path = %path.display(), data_root = %config.data_root.display(), "Loaded extensions config");
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(root) = std::env::var_os(env_vars::DATA_ROOT).filter(|v| !v.is_empty()) {
            self.data_root = PathBuf::from(root);
        }
        if let Some(dir) = std::env::var_os(env_vars::EXTENSIONS_DIR).filter(|v| !v.is_empty()) {
            self.extensions_dir = Some(PathBuf::from(dir));
        }
    }

    /// Directory searched by the local finders.
    pub fn extensions_dir(&self) -> PathBuf {
        self.extensions_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join(paths::EXTENSIONS))
    }

    /// Root of the extension data folders.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join(paths::DATA_EXTENSIONS))
    }

    /// Root of unpacked package archives.
    pub fn unpack_dir(&self) -> PathBuf {
        self.unpack_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join(paths::UNPACKED))
    }

    pub fn local_repository(&self) -> PathBuf {
        self.local_repository.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".m2")
                .join("repository")
        })
    }

    /// Configured repositories with Maven Central appended when none of
    /// them points at it. Repositories without a proxy use `proxy`.
    pub fn effective_repositories(&self, proxy: &ProxyConfig) -> Vec<RemoteRepository> {
        let mut repositories: Vec<RemoteRepository> = self
            .repositories
            .iter()
            .cloned()
            .map(|r| {
                if r.proxy.is_none() {
                    r.with_proxy(Some(proxy.clone()))
                } else {
                    r
                }
            })
            .collect();
        if !repositories.iter().any(RemoteRepository::is_maven_central) {
            repositories.push(RemoteRepository::maven_central(Some(proxy.clone())));
        }
        repositories
    }
}

/// Bot account credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotAccount {
    pub name: String,
    pub token: String,
    pub creator_id: i64,
}

impl BotAccount {
    /// Numeric account id: the part of the token before the first `:`.
    pub fn id(&self) -> Result<i64, ConfigError> {
        let prefix = self.token.split(':').next().unwrap_or_default();
        prefix.trim().parse().map_err(|_| ConfigError::InvalidAccount {
            name: self.name.clone(),
            reason: "token does not start with a numeric bot id".to_string(),
        })
    }
}

/// Configuration of one bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub enabled: bool,
    pub account: BotAccount,
    /// Extension packages enabled for this bot.
    #[serde(default)]
    pub extensions: Vec<ExtensionCoordinate>,
    /// Proxy of this bot; the host proxy is used when unset or disabled.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct BotsFile {
    #[serde(default)]
    bots: Vec<BotConfig>,
}

impl BotConfig {
    /// Parse a `[[bots]]` TOML document.
    pub fn list_from_toml_str(content: &str) -> Result<Vec<Self>, ConfigError> {
        let file: BotsFile = toml::from_str(content)?;
        Ok(file.bots)
    }

    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        Self::list_from_toml_str(&read_file(path.as_ref())?)
    }

    /// Proxy this bot uses given the host proxy.
    pub fn effective_proxy(&self, host_proxy: &ProxyConfig) -> ProxyConfig {
        match &self.proxy {
            Some(proxy) if proxy.is_enabled() => proxy.clone(),
            _ if host_proxy.is_enabled() => host_proxy.clone(),
            _ => ProxyConfig::default(),
        }
    }

    /// Identity handed to extension factories.
    pub fn context(&self, host_proxy: &ProxyConfig) -> Result<BotContext, ConfigError> {
        Ok(
            BotContext::new(self.account.id()?, self.account.name.clone(), self.account.creator_id)
                .with_proxy(self.effective_proxy(host_proxy)),
        )
    }
}
