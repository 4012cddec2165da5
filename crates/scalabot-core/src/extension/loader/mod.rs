//! Isolated loaders.
//!
//! Every coordinate gets one [`IsolatedLoader`] made of two code units:
//!
//! ```text
//!   extension unit  (the package's own files, factory manifest read here)
//!        │ parent
//!        ▼
//!   dependency unit (transitive dependency files only)
//!        │ parent
//!        ▼
//!   host process
//! ```
//!
//! A factory manifest shipped inside a dependency is visible through
//! [`CodeUnit::resources`] but never through factory discovery, so a
//! dependency cannot smuggle factories into a bot.

pub mod builtin;
pub mod linker;
pub mod native;
pub mod registry;
pub mod unit;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use scalabot_extension_sdk::{parse_factory_manifest, BotExtensionFactory, FACTORY_MANIFEST};

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::package::ResolvedPackage;
use crate::extension::{ExtensionError, Result};

pub use builtin::BuiltinLinker;
pub use linker::{FactoryLinker, LinkedUnit};
pub use native::NativeLinker;
pub use registry::LoaderRegistry;
pub use unit::CodeUnit;

/// What loader construction needs from the host.
#[derive(Clone)]
pub struct LoaderEnvironment {
    pub linker: Arc<dyn FactoryLinker>,
    /// Root below which package archives are unpacked.
    pub unpack_dir: PathBuf,
}

impl LoaderEnvironment {
    pub fn new(linker: Arc<dyn FactoryLinker>, unpack_dir: impl Into<PathBuf>) -> Self {
        Self {
            linker,
            unpack_dir: unpack_dir.into(),
        }
    }
}

/// Execution context for exactly one coordinate.
pub struct IsolatedLoader {
    coordinate: ExtensionCoordinate,
    package: ResolvedPackage,
    extension_unit: Arc<CodeUnit>,
    // Field order: extension code is released before dependency code.
    extension_code: Arc<dyn LinkedUnit>,
    _dependency_code: Arc<dyn LinkedUnit>,
    closed: AtomicBool,
    created_at: DateTime<Utc>,
}

impl IsolatedLoader {
    /// Build the loader for `package`.
    pub fn build(
        coordinate: &ExtensionCoordinate,
        package: &ResolvedPackage,
        env: &LoaderEnvironment,
    ) -> Result<Self> {
        let layout = package.unit_layout();
        let unpack_root = env
            .unpack_dir
            .join(unit::unpack_dir_name(coordinate, &package.origin));

        let dependency_roots = materialize_all(&layout.dependencies, &unpack_root.join("dependencies"))?;
        let extension_roots = materialize_all(&layout.extension, &unpack_root.join("extension"))?;

        let dependency_unit = Arc::new(CodeUnit::new(
            format!("{}#dependencies", coordinate),
            dependency_roots,
            None,
        ));
        let extension_unit = Arc::new(CodeUnit::new(
            coordinate.to_string(),
            extension_roots,
            Some(dependency_unit.clone()),
        ));

        let dependency_code = env.linker.link(&dependency_unit, None)?;
        let extension_code = env.linker.link(&extension_unit, Some(&dependency_code))?;

        info!(
            coordinate = %coordinate,
            origin = %package.origin,
            linker = env.linker.name(),
            dependencies = layout.dependencies.len(),
            "Created isolated extension loader"
        );

        Ok(Self {
            coordinate: coordinate.clone(),
            package: package.clone(),
            extension_unit,
            extension_code,
            _dependency_code: dependency_code,
            closed: AtomicBool::new(false),
            created_at: Utc::now(),
        })
    }

    pub fn coordinate(&self) -> &ExtensionCoordinate {
        &self.coordinate
    }

    pub fn package(&self) -> &ResolvedPackage {
        &self.package
    }

    pub fn extension_unit(&self) -> &Arc<CodeUnit> {
        &self.extension_unit
    }

    pub fn dependency_unit(&self) -> Option<&Arc<CodeUnit>> {
        self.extension_unit.parent()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Factory symbols declared by the extension package itself.
    pub fn declared_factories(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut symbols: Vec<String> = Vec::new();
        for manifest in self.extension_unit.find_resources(FACTORY_MANIFEST) {
            let content = fs::read_to_string(&manifest)?;
            for symbol in parse_factory_manifest(&content) {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        debug!(coordinate = %self.coordinate, factories = ?symbols, "Read factory manifest");
        Ok(symbols)
    }

    /// Construct the factory exported under `symbol` by the extension unit.
    pub fn resolve_factory(&self, symbol: &str) -> Result<Box<dyn BotExtensionFactory>> {
        self.ensure_open()?;
        self.extension_code.resolve_factory(symbol)
    }

    /// Refuse any further factory resolution. Code stays mapped until the
    /// last reference to the loader is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(coordinate = %self.coordinate, "Closed extension loader");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ExtensionError::LoaderClosed(self.coordinate.to_string()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for IsolatedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedLoader")
            .field("coordinate", &self.coordinate)
            .field("origin", &self.package.origin)
            .field("closed", &self.is_closed())
            .field("created_at", &self.created_at)
            .finish()
    }
}

fn materialize_all(files: &[PathBuf], target_dir: &Path) -> Result<Vec<PathBuf>> {
    files
        .iter()
        .enumerate()
        .map(|(index, file)| unit::materialize(file, target_dir, index))
        .collect()
}
