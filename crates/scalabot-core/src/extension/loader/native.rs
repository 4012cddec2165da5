//! Native linker for .so/.dylib/.dll extension libraries.

use std::path::PathBuf;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use scalabot_extension_sdk::{
    BotExtensionFactory, FactoryCreateFn, ABI_VERSION_SYMBOL, EXTENSION_ABI_VERSION,
};

use crate::extension::loader::linker::{FactoryLinker, LinkedUnit};
use crate::extension::loader::unit::CodeUnit;
use crate::extension::{ExtensionError, Result};

type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Links units by opening their native libraries with `libloading`.
///
/// Libraries are opened with the platform default flags, which keeps their
/// symbols local to the handle on Unix. Libraries that export the ABI
/// version symbol are extension libraries and must match
/// [`EXTENSION_ABI_VERSION`]; other libraries are plain dependencies.
#[derive(Debug, Default)]
pub struct NativeLinker;

impl NativeLinker {
    pub fn new() -> Self {
        Self
    }
}

struct LoadedLibrary {
    path: PathBuf,
    library: Library,
    exports_factories: bool,
}

/// Libraries of one linked unit, kept open until dropped.
pub struct NativeUnit {
    name: String,
    libraries: Vec<LoadedLibrary>,
    // Keep the parent's libraries mapped for as long as ours are.
    _parent: Option<Arc<dyn LinkedUnit>>,
}

impl NativeUnit {
    pub fn library_paths(&self) -> Vec<&PathBuf> {
        self.libraries.iter().map(|l| &l.path).collect()
    }
}

impl FactoryLinker for NativeLinker {
    fn name(&self) -> &str {
        "native"
    }

    fn link(&self, unit: &CodeUnit, parent: Option<&Arc<dyn LinkedUnit>>) -> Result<Arc<dyn LinkedUnit>> {
        let mut libraries = Vec::new();
        for path in unit.native_libraries() {
            // SAFETY: loading a library runs its initializers; extension
            // packages are trusted once they passed the conflict check.
            let library = unsafe { Library::new(&path) }.map_err(|e| {
                ExtensionError::LoadFailed(format!("{}: {}", path.display(), e))
            })?;

            let abi: Option<Symbol<AbiVersionFn>> =
                unsafe { library.get(ABI_VERSION_SYMBOL.as_bytes()) }.ok();
            let exports_factories = match abi {
                Some(abi) => {
                    check_abi_version(unsafe { abi() })?;
                    true
                }
                None => false,
            };

            debug!(
                unit = unit.name(),
                library = %path.display(),
                exports_factories,
                "Opened native library"
            );
            libraries.push(LoadedLibrary {
                path,
                library,
                exports_factories,
            });
        }

        if libraries.is_empty() {
            debug!(unit = unit.name(), "Unit has no native libraries");
        }

        Ok(Arc::new(NativeUnit {
            name: unit.name().to_string(),
            libraries,
            _parent: parent.cloned(),
        }))
    }
}

/// Extension libraries must report the host's ABI version.
fn check_abi_version(got: u32) -> Result<()> {
    if got == EXTENSION_ABI_VERSION {
        Ok(())
    } else {
        Err(ExtensionError::AbiMismatch {
            expected: EXTENSION_ABI_VERSION,
            got,
        })
    }
}

impl LinkedUnit for NativeUnit {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn resolve_factory(&self, symbol: &str) -> Result<Box<dyn BotExtensionFactory>> {
        for loaded in self.libraries.iter().filter(|l| l.exports_factories) {
            let create: Symbol<FactoryCreateFn> = match unsafe { loaded.library.get(symbol.as_bytes()) } {
                Ok(create) => create,
                Err(_) => continue,
            };

            let raw = unsafe { create() };
            if raw.is_null() {
                warn!(symbol, library = %loaded.path.display(), "Factory constructor returned null");
                return Err(ExtensionError::FactoryFailed {
                    factory: symbol.to_string(),
                    reason: "constructor returned null".to_string(),
                });
            }
            // SAFETY: the pointer was produced by `Box::into_raw` in the
            // library's exported constructor.
            let factory: Box<Box<dyn BotExtensionFactory>> = unsafe { Box::from_raw(raw) };
            return Ok(*factory);
        }
        Err(ExtensionError::SymbolNotFound(symbol.to_string()))
    }
}
