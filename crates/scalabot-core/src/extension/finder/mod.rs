//! Package finders and the tiered search protocol.
//!
//! Finders are registered with a priority; lower priorities are searched
//! first. Once a tier has produced at least one package, no finder of a
//! later tier is invoked. Finders of the same tier are always all invoked,
//! which is what lets the conflict check see every candidate.

pub mod file_name;
pub mod metadata;
pub mod repository;

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::package::ResolvedPackage;
use crate::extension::Result;

pub use file_name::FileNameFinder;
pub use metadata::PackageMetadataFinder;
pub use repository::{
    ArtifactResolution, ArtifactResolver, DependencyResolution, LocalRepositoryResolver,
    RemoteRepository, RepositoryFinder, ResolvedArtifact, MAVEN_CENTRAL_URL,
};

/// Conventional finder priorities.
pub mod priority {
    /// Packages on the local filesystem.
    pub const LOCAL: i32 = 100;
    /// Packages from remote repositories.
    pub const REMOTE: i32 = 200;
    /// Fallback sources.
    pub const ALTERNATE: i32 = 500;
}

/// A way of locating packages for a coordinate.
pub trait PackageFinder: Send + Sync {
    /// Finder name used in logs and conflict reports.
    fn name(&self) -> &str;

    /// Find every package matching `coordinate`.
    ///
    /// `search_path` is the host's extensions directory; finders that do not
    /// read the local filesystem may ignore it.
    fn find(
        &self,
        coordinate: &ExtensionCoordinate,
        search_path: &Path,
    ) -> Result<Vec<ResolvedPackage>>;
}

struct RegisteredFinder {
    finder: Arc<dyn PackageFinder>,
    priority: Option<i32>,
}

/// Non-empty result of one finder.
#[derive(Debug, Clone)]
pub struct FinderHits {
    pub finder: String,
    pub priority: i32,
    pub packages: Vec<ResolvedPackage>,
}

/// Results of a search, in the order the finders were invoked.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub hits: Vec<FinderHits>,
}

impl SearchResult {
    pub fn new(hits: Vec<FinderHits>) -> Self {
        Self { hits }
    }

    /// True when no finder produced a package.
    pub fn is_empty(&self) -> bool {
        self.hits.iter().all(|h| h.packages.is_empty())
    }

    /// Total number of packages over all finders.
    pub fn package_count(&self) -> usize {
        self.hits.iter().map(|h| h.packages.len()).sum()
    }

    pub fn packages(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.hits.iter().flat_map(|h| h.packages.iter())
    }
}

/// The set of finders known to the host.
///
/// Built once while composing the host and shared read-only afterwards.
pub struct FinderRegistry {
    search_path: PathBuf,
    finders: Vec<RegisteredFinder>,
}

impl FinderRegistry {
    /// Create an empty registry searching `search_path`.
    pub fn new(search_path: impl Into<PathBuf>) -> Self {
        Self {
            search_path: search_path.into(),
            finders: Vec::new(),
        }
    }

    /// Registry with the two built-in local finders.
    pub fn with_local_finders(search_path: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new(search_path);
        registry
            .register(FileNameFinder, priority::LOCAL)
            .register(PackageMetadataFinder, priority::LOCAL);
        registry
    }

    /// Register a finder at `priority`.
    pub fn register<F: PackageFinder + 'static>(&mut self, finder: F, priority: i32) -> &mut Self {
        self.register_shared(Arc::new(finder), priority)
    }

    /// Register an already shared finder at `priority`.
    pub fn register_shared(&mut self, finder: Arc<dyn PackageFinder>, priority: i32) -> &mut Self {
        self.finders.push(RegisteredFinder {
            finder,
            priority: Some(priority),
        });
        self
    }

    /// Register a finder without a priority. It is kept but never consulted.
    pub fn register_inert<F: PackageFinder + 'static>(&mut self, finder: F) -> &mut Self {
        self.finders.push(RegisteredFinder {
            finder: Arc::new(finder),
            priority: None,
        });
        self
    }

    pub fn search_path(&self) -> &Path {
        &self.search_path
    }

    /// Number of registered finders, inert ones included.
    pub fn len(&self) -> usize {
        self.finders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finders.is_empty()
    }

    /// Run the tiered search for `coordinate`.
    pub fn search(&self, coordinate: &ExtensionCoordinate) -> SearchResult {
        let mut active: Vec<(&Arc<dyn PackageFinder>, i32)> = self
            .finders
            .iter()
            .filter_map(|f| f.priority.map(|p| (&f.finder, p)))
            .collect();
        // Stable: registration order is kept within a tier.
        active.sort_by_key(|(_, p)| *p);

        let mut hits: Vec<FinderHits> = Vec::new();
        let Some(&(_, mut current_tier)) = active.first() else {
            return SearchResult::default();
        };

        for (finder, priority) in active {
            if priority > current_tier && !hits.is_empty() {
                break;
            }
            current_tier = priority;

            let packages = self.invoke(finder.as_ref(), coordinate);
            if packages.is_empty() {
                continue;
            }
            debug!(
                coordinate = %coordinate,
                finder = finder.name(),
                priority,
                count = packages.len(),
                "Finder produced packages"
            );
            hits.push(FinderHits {
                finder: finder.name().to_string(),
                priority,
                packages,
            });
        }

        SearchResult::new(hits)
    }

    fn invoke(&self, finder: &dyn PackageFinder, coordinate: &ExtensionCoordinate) -> Vec<ResolvedPackage> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            finder.find(coordinate, &self.search_path)
        }));
        let found = match outcome {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                error!(
                    coordinate = %coordinate,
                    finder = finder.name(),
                    error = %e,
                    "Finder failed while searching for extension"
                );
                return Vec::new();
            }
            Err(payload) => {
                error!(
                    coordinate = %coordinate,
                    finder = finder.name(),
                    panic = panic_message(payload.as_ref()),
                    "Finder panicked while searching for extension"
                );
                return Vec::new();
            }
        };

        let mut unique: Vec<ResolvedPackage> = Vec::with_capacity(found.len());
        for package in found {
            if !unique.contains(&package) {
                unique.push(package);
            }
        }
        unique
    }
}

/// Best effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
