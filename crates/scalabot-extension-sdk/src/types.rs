//! Common types shared between the host and extensions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FactoryResult;

/// Proxy protocol used by a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyType {
    #[default]
    NoProxy,
    Http,
    Https,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProxyType::NoProxy => "NO_PROXY",
            ProxyType::Http => "HTTP",
            ProxyType::Https => "HTTPS",
            ProxyType::Socks4 => "SOCKS4",
            ProxyType::Socks5 => "SOCKS5",
        };
        f.write_str(s)
    }
}

/// Proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(rename = "type", default)]
    pub proxy_type: ProxyType,
    #[serde(default = "default_proxy_host")]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    1080
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_type: ProxyType::NoProxy,
            host: default_proxy_host(),
            port: default_proxy_port(),
        }
    }
}

impl ProxyConfig {
    /// Create a proxy configuration.
    pub fn new(proxy_type: ProxyType, host: impl Into<String>, port: u16) -> Self {
        Self {
            proxy_type,
            host: host.into(),
            port,
        }
    }

    /// Whether traffic should go through a proxy at all.
    pub fn is_enabled(&self) -> bool {
        self.proxy_type != ProxyType::NoProxy
    }
}

/// Identity of the bot an extension is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotContext {
    /// Numeric bot account id
    pub account_id: i64,
    /// Bot username
    pub username: String,
    /// Account id of the bot owner
    pub creator_id: i64,
    /// Proxy used by this bot
    pub proxy: ProxyConfig,
}

impl BotContext {
    /// Create a bot context without a proxy.
    pub fn new(account_id: i64, username: impl Into<String>, creator_id: i64) -> Self {
        Self {
            account_id,
            username: username.into(),
            creator_id,
            proxy: ProxyConfig::default(),
        }
    }

    /// Set the proxy configuration
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }
}

/// Extra parameters handed to a factory when it creates an extension.
///
/// The values are copies; a factory may keep them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotExtensionCreateOptions {
    /// Account id of the bot the extension is created for
    pub bot_account_id: i64,
    /// Proxy configuration of that bot
    pub proxy: ProxyConfig,
}

impl BotExtensionCreateOptions {
    pub fn new(bot_account_id: i64, proxy: ProxyConfig) -> Self {
        Self {
            bot_account_id,
            proxy,
        }
    }

    /// Build the options for a bot.
    pub fn for_bot(bot: &BotContext) -> Self {
        Self::new(bot.account_id, bot.proxy.clone())
    }
}

/// Command an extension contributes to its bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// An extension instance registered with one bot.
pub trait BotExtension: Send + Sync {
    /// Extension name, used in logs.
    fn name(&self) -> &str;

    /// Commands this extension contributes.
    fn commands(&self) -> Vec<CommandDescriptor> {
        Vec::new()
    }
}

/// Factory that builds extensions for bots.
///
/// A package declares its factories in its manifest; the host calls every
/// declared factory once per bot that enables the package. Returning
/// `Ok(None)` means "nothing for this bot" and is not an error.
pub trait BotExtensionFactory: Send + Sync {
    /// Create the extension for `bot`.
    ///
    /// `data_folder` is shared by every bot using this package and already
    /// exists when the factory is called.
    fn create_extension(
        &self,
        bot: &BotContext,
        data_folder: &Path,
        options: &BotExtensionCreateOptions,
    ) -> FactoryResult<Option<Box<dyn BotExtension>>>;

    /// Name of the concrete factory type.
    fn factory_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Signature of an exported factory symbol.
///
/// The returned pointer owns a boxed trait object and is reclaimed by the
/// host with `Box::from_raw`. A null pointer means the factory could not be
/// constructed.
pub type FactoryCreateFn = unsafe extern "C" fn() -> *mut Box<dyn BotExtensionFactory>;

/// Constructor of a statically linked factory.
pub type FactoryConstructor = fn() -> Box<dyn BotExtensionFactory>;
