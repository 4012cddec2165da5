//! Extension system for scalabot.
//!
//! Extensions are third-party packages that contribute behavior to a bot.
//! A bot names the packages it wants by coordinate; every package is found,
//! checked for ambiguity and loaded into an isolated loader shared by all
//! bots that use the same coordinate.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                  ExtensionLoader                   │
//! │  - one pass per bot, one coordinate at a time      │
//! └────────────────────────────────────────────────────┘
//!          │                 │                 │
//!          ▼                 ▼                 ▼
//!  ┌───────────────┐ ┌───────────────┐ ┌───────────────┐
//!  │FinderRegistry │ │   conflict    │ │LoaderRegistry │
//!  │ tiered search │ │  fail closed  │ │shared, counted│
//!  └───────────────┘ └───────────────┘ └───────────────┘
//!          │                                   │
//!          ▼                                   ▼
//!  FileName (LOCAL)                    IsolatedLoader
//!  PackageMetadata (LOCAL)             extension unit
//!  Repository (REMOTE)                   └─▶ dependency unit
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scalabot_core::extension::{ExtensionInstantiator, ExtensionLoader};
//! use scalabot_core::extension::finder::FinderRegistry;
//! use scalabot_core::extension::loader::{LoaderRegistry, NativeLinker};
//!
//! let finders = Arc::new(FinderRegistry::with_local_finders(config.extensions_dir()));
//! let loaders = Arc::new(LoaderRegistry::new(Arc::new(NativeLinker::new()), config.unpack_dir()));
//! let instantiator = ExtensionInstantiator::new(config.data_dir());
//!
//! let loaded = ExtensionLoader::new(bot, coordinates, finders, loaders, instantiator).load();
//! // ... run the bot ...
//! loaded.release()?;
//! ```

pub mod conflict;
pub mod coordinate;
pub mod error;
pub mod finder;
pub mod instantiator;
pub mod loader;
pub mod loading;
pub mod package;

pub use coordinate::{CoordinateParseError, ExtensionCoordinate};
pub use error::{ExtensionError, Result};
pub use instantiator::{ExtensionInstantiator, LoadedExtensionEntry};
pub use loading::{BotExtensions, ExtensionLoader, LoadOutcome};
pub use package::{PackageSource, ResolvedPackage, UnitLayout};

/// Check if a file is a native extension library.
pub fn is_native_library(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| matches!(ext, "so" | "dylib" | "dll"))
        .unwrap_or(false)
}

/// Check if a file is a packaged (zip based) extension archive.
pub fn is_package_archive(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| matches!(ext, "jar" | "zip"))
        .unwrap_or(false)
}
