//! Packages found by finders.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::extension::coordinate::ExtensionCoordinate;

/// Where the files of a resolved package live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// A package file or an exploded package directory.
    Local { path: PathBuf },
    /// An artifact fetched from a repository, with all of its transitive
    /// dependencies already on disk.
    Repository {
        artifact: PathBuf,
        repository: String,
        dependencies: Vec<PathBuf>,
    },
}

/// Files that make up the two code units of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitLayout {
    pub extension: Vec<PathBuf>,
    pub dependencies: Vec<PathBuf>,
}

/// One physical candidate for a coordinate.
///
/// Two packages are the same package when they share coordinate and origin;
/// the finder that produced them does not take part in the comparison.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub coordinate: ExtensionCoordinate,
    /// Human readable locator, used in conflict reports.
    pub origin: String,
    /// Name of the finder that produced this package.
    pub finder: String,
    pub source: PackageSource,
}

impl ResolvedPackage {
    /// A package read from the local filesystem.
    pub fn local(
        coordinate: ExtensionCoordinate,
        path: impl Into<PathBuf>,
        finder: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let origin = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string();
        Self {
            coordinate,
            origin,
            finder: finder.into(),
            source: PackageSource::Local { path },
        }
    }

    /// Main file or directory of the package.
    pub fn package_path(&self) -> &Path {
        match &self.source {
            PackageSource::Local { path } => path,
            PackageSource::Repository { artifact, .. } => artifact,
        }
    }

    /// Split the package into its extension files and dependency files.
    pub fn unit_layout(&self) -> UnitLayout {
        match &self.source {
            PackageSource::Local { path } => UnitLayout {
                extension: vec![path.clone()],
                dependencies: Vec::new(),
            },
            PackageSource::Repository {
                artifact,
                dependencies,
                ..
            } => UnitLayout {
                extension: vec![artifact.clone()],
                dependencies: dependencies.clone(),
            },
        }
    }
}

impl PartialEq for ResolvedPackage {
    fn eq(&self, other: &Self) -> bool {
        self.coordinate == other.coordinate && self.origin == other.origin
    }
}

impl Eq for ResolvedPackage {}

impl Hash for ResolvedPackage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coordinate.hash(state);
        self.origin.hash(state);
    }
}
