//! Shared fixtures for the scalabot-core integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scalabot_core::extension::finder::FinderRegistry;
use scalabot_core::extension::loader::{BuiltinLinker, LoaderRegistry};
use scalabot_core::extension::{ExtensionCoordinate, ExtensionInstantiator, ExtensionLoader};
use scalabot_extension_sdk::prelude::*;
use zip::write::SimpleFileOptions;

/// Coordinate of the example package.
pub const EXAMPLE_GROUP: &str = "net.lamgc.scalabot";
pub const EXAMPLE_NAME: &str = "scalabot-ext-example";
pub const EXAMPLE_VERSION: &str = "0.1.0";

pub fn example_coordinate() -> ExtensionCoordinate {
    ExtensionCoordinate::new(EXAMPLE_GROUP, EXAMPLE_NAME, EXAMPLE_VERSION)
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("scalabot_core=debug"))
        .with_test_writer()
        .try_init();
}

pub fn bot(username: &str, creator_id: i64) -> BotContext {
    BotContext::new(1001, username, creator_id)
}

#[derive(Default)]
pub struct FailingFactory;

impl BotExtensionFactory for FailingFactory {
    fn create_extension(
        &self,
        _bot: &BotContext,
        _data_folder: &Path,
        _options: &BotExtensionCreateOptions,
    ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
        Err(FactoryError::InitializationFailed("missing api key".into()))
    }
}

#[derive(Default)]
pub struct PanickingFactory;

impl BotExtensionFactory for PanickingFactory {
    fn create_extension(
        &self,
        _bot: &BotContext,
        _data_folder: &Path,
        _options: &BotExtensionCreateOptions,
    ) -> FactoryResult<Option<Box<dyn BotExtension>>> {
        panic!("extension bug")
    }
}

/// Linker knowing the example package plus two broken factories.
pub fn linker() -> BuiltinLinker {
    BuiltinLinker::new()
        .with_factories(scalabot_ext_example::exported_factories())
        .with_factory("failing_factory", || Box::new(FailingFactory))
        .with_factory("panicking_factory", || Box::new(PanickingFactory))
}

/// Exploded package directory at `root/dir_name`.
pub fn write_dir_package(root: &Path, dir_name: &str, manifest: &str, pom_properties: Option<&str>) -> PathBuf {
    let package = root.join(dir_name);
    let manifest_path = package.join(FACTORY_MANIFEST);
    fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();
    fs::write(manifest_path, manifest).unwrap();
    if let Some(properties) = pom_properties {
        let maven_dir = package.join("META-INF/maven");
        fs::create_dir_all(&maven_dir).unwrap();
        fs::write(maven_dir.join("pom.properties"), properties).unwrap();
    }
    package
}

/// Zip package at `path`.
pub fn write_zip_package(path: &Path, manifest: &str, pom_properties: Option<&str>) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    writer.start_file(FACTORY_MANIFEST, SimpleFileOptions::default()).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    if let Some(properties) = pom_properties {
        writer
            .start_file("META-INF/maven/org.example/pom.properties", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(properties.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path.to_path_buf()
}

pub fn pom_properties(coordinate: &ExtensionCoordinate) -> String {
    format!(
        "groupId={}\nartifactId={}\nversion={}\n",
        coordinate.group, coordinate.name, coordinate.version
    )
}

/// Directories of one test host.
pub struct Host {
    pub extensions: tempfile::TempDir,
    pub data: tempfile::TempDir,
    pub unpack: tempfile::TempDir,
    pub finders: Arc<FinderRegistry>,
    pub loaders: Arc<LoaderRegistry>,
}

impl Host {
    /// Host with the built-in local finders.
    pub fn local() -> Self {
        let extensions = tempfile::tempdir().unwrap();
        let finders = FinderRegistry::with_local_finders(extensions.path());
        Self::with_finders(extensions, finders)
    }

    pub fn with_finders(extensions: tempfile::TempDir, finders: FinderRegistry) -> Self {
        let unpack = tempfile::tempdir().unwrap();
        let loaders = Arc::new(LoaderRegistry::new(Arc::new(linker()), unpack.path()));
        Self {
            extensions,
            data: tempfile::tempdir().unwrap(),
            unpack,
            finders: Arc::new(finders),
            loaders,
        }
    }

    pub fn loader(&self, bot: BotContext, coordinates: Vec<ExtensionCoordinate>) -> ExtensionLoader {
        ExtensionLoader::new(
            bot,
            coordinates,
            self.finders.clone(),
            self.loaders.clone(),
            ExtensionInstantiator::new(self.data.path()),
        )
    }
}
