//! Core types and the extension subsystem of scalabot.
//!
//! A scalabot host runs several independent bots. Every bot lists the
//! extension packages it wants by coordinate; this crate finds those
//! packages, refuses ambiguous matches and loads each package into its own
//! isolated loader before asking the package's factories for extensions.

pub mod config;
pub mod extension;

pub use config::{BotAccount, BotConfig, ConfigError, ExtensionsConfig};
pub use extension::{
    BotExtensions, ExtensionCoordinate, ExtensionError, ExtensionLoader, LoadOutcome,
    LoadedExtensionEntry, ResolvedPackage, Result,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{BotConfig, ExtensionsConfig};
    pub use crate::extension::conflict::Verdict;
    pub use crate::extension::finder::{priority, FinderRegistry, PackageFinder};
    pub use crate::extension::loader::{BuiltinLinker, FactoryLinker, LoaderRegistry, NativeLinker};
    pub use crate::extension::{
        BotExtensions, ExtensionCoordinate, ExtensionError, ExtensionInstantiator,
        ExtensionLoader, LoadOutcome, LoadedExtensionEntry, ResolvedPackage, Result,
    };
    pub use scalabot_extension_sdk::{BotContext, BotExtension, ProxyConfig, ProxyType};
}
