//! scalabot Extension SDK
//!
//! This SDK provides the types and macros an extension package needs to hand
//! bot extensions to a scalabot host.
//!
//! # Package layout
//!
//! ```text
//! my-extension.jar (zip archive) or my-extension/ (directory)
//! ├── META-INF/
//! │   ├── maven/org.example/my-extension/pom.properties   (optional self-description)
//! │   └── scalabot/extension-factories                     (factory manifest)
//! └── lib/
//!     └── libmy_extension.so                               (native code)
//! ```
//!
//! The factory manifest lists one exported factory symbol per line. The host
//! only reads the manifest of the extension package itself, never the
//! manifests of its dependencies.
//!
//! # Quick Start
//!
//! ```rust
//! use scalabot_extension_sdk::prelude::*;
//! use std::path::Path;
//!
//! struct Hello;
//!
//! impl BotExtension for Hello {
//!     fn name(&self) -> &str {
//!         "hello"
//!     }
//! }
//!
//! #[derive(Default)]
//! struct HelloFactory;
//!
//! impl BotExtensionFactory for HelloFactory {
//!     fn create_extension(
//!         &self,
//!         _bot: &BotContext,
//!         _data_folder: &Path,
//!         _options: &BotExtensionCreateOptions,
//!     ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
//!         Ok(Some(Box::new(Hello)))
//!     }
//! }
//!
//! export_factories!(hello_factory => HelloFactory);
//! ```

pub mod error;
#[macro_use]
pub mod macros;
pub mod types;

pub use error::{FactoryError, FactoryResult};
pub use types::{
    BotContext, BotExtension, BotExtensionCreateOptions, BotExtensionFactory, CommandDescriptor,
    FactoryConstructor, FactoryCreateFn, ProxyConfig, ProxyType,
};

/// ABI version shared by the host and native extension libraries.
///
/// Incremented whenever the layout of the exported factory symbols or the
/// factory traits change.
pub const EXTENSION_ABI_VERSION: u32 = 1;

/// Symbol every native extension library exports to report its ABI version.
pub const ABI_VERSION_SYMBOL: &str = "scalabot_extension_abi_version";

/// Location of the factory manifest inside an extension package.
pub const FACTORY_MANIFEST: &str = "META-INF/scalabot/extension-factories";

/// Prelude module with common imports
pub mod prelude {
    pub use crate::error::{FactoryError, FactoryResult};
    pub use crate::types::{
        BotContext, BotExtension, BotExtensionCreateOptions, BotExtensionFactory,
        CommandDescriptor, FactoryConstructor, ProxyConfig, ProxyType,
    };
    pub use crate::{export_factories, EXTENSION_ABI_VERSION, FACTORY_MANIFEST};
}

/// Parse the content of a factory manifest.
///
/// One factory symbol per line; everything after `#` is a comment, blank
/// lines are ignored and repeated symbols are only reported once.
pub fn parse_factory_manifest(content: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let symbol = line.trim();
        if symbol.is_empty() || symbols.iter().any(|s| s == symbol) {
            continue;
        }
        symbols.push(symbol.to_string());
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_factory_manifest() {
        let content = "# factories\nhello_factory\n\n  echo_factory  # trailing\nhello_factory\n";
        assert_eq!(
            parse_factory_manifest(content),
            vec!["hello_factory".to_string(), "echo_factory".to_string()]
        );
    }

    #[test]
    fn test_parse_empty_manifest() {
        assert!(parse_factory_manifest("").is_empty());
        assert!(parse_factory_manifest("# only a comment\n   \n").is_empty());
    }
}
