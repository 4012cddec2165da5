//! Registry sharing isolated loaders between bots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::loader::{FactoryLinker, IsolatedLoader, LoaderEnvironment};
use crate::extension::package::ResolvedPackage;
use crate::extension::{ExtensionError, Result};

struct RegistryEntry {
    loader: Arc<IsolatedLoader>,
    usage: usize,
}

/// One loader per coordinate, reference counted by bot acquisitions.
///
/// The whole map sits behind one mutex which is also held while a loader is
/// built, so two bots asking for the same coordinate at once still end up
/// with the same loader.
pub struct LoaderRegistry {
    env: LoaderEnvironment,
    entries: Mutex<HashMap<ExtensionCoordinate, RegistryEntry>>,
}

impl LoaderRegistry {
    pub fn new(linker: Arc<dyn FactoryLinker>, unpack_dir: impl Into<PathBuf>) -> Self {
        Self::with_environment(LoaderEnvironment::new(linker, unpack_dir))
    }

    pub fn with_environment(env: LoaderEnvironment) -> Self {
        Self {
            env,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the loader for `coordinate`, building it from `package` when none
    /// is registered. Every call counts as one usage.
    pub fn acquire(
        &self,
        coordinate: &ExtensionCoordinate,
        package: &ResolvedPackage,
    ) -> Result<Arc<IsolatedLoader>> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(coordinate) {
            entry.usage += 1;
            debug!(coordinate = %coordinate, usage = entry.usage, "Reusing extension loader");
            return Ok(entry.loader.clone());
        }

        let loader = Arc::new(IsolatedLoader::build(coordinate, package, &self.env)?);
        entries.insert(
            coordinate.clone(),
            RegistryEntry {
                loader: loader.clone(),
                usage: 1,
            },
        );
        Ok(loader)
    }

    /// Release one usage of every coordinate. A loader whose usage drops to
    /// zero is closed and removed.
    ///
    /// Stops at the first coordinate without a registered loader; usages
    /// released before it stay released.
    pub fn release(&self, coordinates: &[ExtensionCoordinate]) -> Result<()> {
        let mut entries = self.entries.lock();
        for coordinate in coordinates {
            let Some(entry) = entries.get_mut(coordinate) else {
                error!(coordinate = %coordinate, "No corresponding loader exists");
                return Err(ExtensionError::NotRegistered(coordinate.to_string()));
            };

            entry.usage = entry.usage.saturating_sub(1);
            if entry.usage == 0 {
                if let Some(entry) = entries.remove(coordinate) {
                    entry.loader.close();
                    info!(coordinate = %coordinate, "Released extension loader");
                }
            } else {
                debug!(coordinate = %coordinate, usage = entry.usage, "Released one loader usage");
            }
        }
        Ok(())
    }

    /// Outstanding usages of `coordinate`, `None` when not registered.
    pub fn usage_count(&self, coordinate: &ExtensionCoordinate) -> Option<usize> {
        self.entries.lock().get(coordinate).map(|e| e.usage)
    }

    /// Registered loader of `coordinate`, without taking a usage.
    pub fn loader(&self, coordinate: &ExtensionCoordinate) -> Option<Arc<IsolatedLoader>> {
        self.entries.lock().get(coordinate).map(|e| e.loader.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
