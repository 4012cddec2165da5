//! Finder backed by an artifact repository.
//!
//! The repository protocol itself lives behind [`ArtifactResolver`]. The
//! finder only turns resolver answers into packages, and refuses packages
//! whose dependency closure could not be resolved completely.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use scalabot_extension_sdk::ProxyConfig;

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::finder::metadata::child_text as text;
use crate::extension::finder::PackageFinder;
use crate::extension::package::{PackageSource, ResolvedPackage};
use crate::extension::Result;

/// Maven Central base URL.
pub const MAVEN_CENTRAL_URL: &str = "https://repo1.maven.org/maven2/";

/// A remote artifact repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    /// `default` for the Maven 2 layout, `legacy` for Maven 1.
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "enabled")]
    pub enable_releases: bool,
    #[serde(default = "enabled")]
    pub enable_snapshots: bool,
}

fn default_layout() -> String {
    "default".to_string()
}

fn enabled() -> bool {
    true
}

impl RemoteRepository {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            layout: default_layout(),
            proxy: None,
            enable_releases: true,
            enable_snapshots: true,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy.filter(ProxyConfig::is_enabled);
        self
    }

    /// Maven Central, optionally reached through `proxy`.
    pub fn maven_central(proxy: Option<ProxyConfig>) -> Self {
        Self::new(MAVEN_CENTRAL_URL).with_id("central").with_proxy(proxy)
    }

    /// Whether this repository points at Maven Central.
    pub fn is_maven_central(&self) -> bool {
        self.url.trim_end_matches('/') == MAVEN_CENTRAL_URL.trim_end_matches('/')
    }

    /// Whether artifacts of `coordinate` may be served from here.
    pub fn accepts(&self, coordinate: &ExtensionCoordinate) -> bool {
        if coordinate.is_snapshot() {
            self.enable_snapshots
        } else {
            self.enable_releases
        }
    }

    /// Download location of `coordinate` in this repository.
    pub fn artifact_url(&self, coordinate: &ExtensionCoordinate) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            coordinate.repository_path()
        )
    }

    /// Display name used in logs.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.url)
    }
}

/// An artifact available on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Coordinate as reported by the resolver, possibly with properties.
    pub coordinate: ExtensionCoordinate,
    pub file: PathBuf,
    /// Repository the artifact came from; `None` for the local repository.
    pub repository: Option<RemoteRepository>,
}

/// Outcome of resolving one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactResolution {
    Resolved(ResolvedArtifact),
    /// No repository has the artifact.
    Missing,
    /// The artifact may exist but could not be fetched.
    Failed(Vec<String>),
}

/// Outcome of resolving one dependency of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResolution {
    pub coordinate: ExtensionCoordinate,
    pub result: ArtifactResolution,
}

/// Repository client consumed by [`RepositoryFinder`].
pub trait ArtifactResolver: Send + Sync {
    /// Resolve the artifact itself.
    fn resolve_artifact(
        &self,
        coordinate: &ExtensionCoordinate,
        repositories: &[RemoteRepository],
    ) -> ArtifactResolution;

    /// Resolve the runtime dependency closure of `artifact`.
    fn resolve_dependencies(
        &self,
        artifact: &ResolvedArtifact,
        repositories: &[RemoteRepository],
    ) -> Vec<DependencyResolution>;
}

/// Finds packages through an [`ArtifactResolver`].
pub struct RepositoryFinder {
    resolver: Arc<dyn ArtifactResolver>,
    repositories: Vec<RemoteRepository>,
}

impl RepositoryFinder {
    pub const NAME: &'static str = "repository";

    pub fn new(resolver: Arc<dyn ArtifactResolver>, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            resolver,
            repositories,
        }
    }

    pub fn repositories(&self) -> &[RemoteRepository] {
        &self.repositories
    }

    fn origin(artifact: &ResolvedArtifact) -> String {
        match &artifact.repository {
            Some(repository) => repository.artifact_url(&artifact.coordinate),
            None => artifact.file.display().to_string(),
        }
    }
}

impl PackageFinder for RepositoryFinder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn find(&self, coordinate: &ExtensionCoordinate, _search_path: &Path) -> Result<Vec<ResolvedPackage>> {
        let repositories: Vec<RemoteRepository> = self
            .repositories
            .iter()
            .filter(|r| r.accepts(coordinate))
            .cloned()
            .collect();

        let artifact = match self.resolver.resolve_artifact(coordinate, &repositories) {
            ArtifactResolution::Resolved(artifact) => artifact,
            ArtifactResolution::Missing => {
                warn!(coordinate = %coordinate, "Artifact not found in repositories");
                return Ok(Vec::new());
            }
            ArtifactResolution::Failed(reasons) => {
                let mut message = String::new();
                for (i, reason) in reasons.iter().enumerate() {
                    let _ = write!(message, "\n[{}] {}", i, reason);
                }
                warn!(
                    coordinate = %coordinate,
                    "Artifact may exist but could not be fetched:{}",
                    message
                );
                return Ok(Vec::new());
            }
        };

        let resolutions = self.resolver.resolve_dependencies(&artifact, &repositories);
        let failed: Vec<&DependencyResolution> = resolutions
            .iter()
            .filter(|d| !matches!(d.result, ArtifactResolution::Resolved(_)))
            .collect();
        if !failed.is_empty() {
            let mut message = String::new();
            for dependency in &failed {
                match &dependency.result {
                    ArtifactResolution::Missing => {
                        let _ = write!(
                            message,
                            "\n\t- {} cannot be found in the repositories",
                            dependency.coordinate
                        );
                    }
                    ArtifactResolution::Failed(reasons) => {
                        let _ = write!(message, "\n\t- {} failed:", dependency.coordinate);
                        for reason in reasons {
                            let _ = write!(message, "\n\t\t- {}", reason);
                        }
                    }
                    ArtifactResolution::Resolved(_) => {}
                }
            }
            error!(
                coordinate = %coordinate,
                "Dependencies of the extension package could not be resolved:{}",
                message
            );
            return Ok(Vec::new());
        }

        let dependencies: Vec<PathBuf> = resolutions
            .into_iter()
            .filter_map(|d| match d.result {
                ArtifactResolution::Resolved(dep) => Some(dep),
                _ => None,
            })
            .filter(|dep| !dep.coordinate.equals_ignoring_properties(&artifact.coordinate))
            .map(|dep| {
                debug!(dependency = %dep.coordinate, file = %dep.file.display(), "Resolved dependency");
                dep.file
            })
            .collect();

        let origin = Self::origin(&artifact);
        let repository = artifact
            .repository
            .as_ref()
            .map(|r| r.label().to_string())
            .unwrap_or_else(|| "local".to_string());

        Ok(vec![ResolvedPackage {
            coordinate: coordinate.clone(),
            origin,
            finder: Self::NAME.to_string(),
            source: PackageSource::Repository {
                artifact: artifact.file,
                repository,
                dependencies,
            },
        }])
    }
}

/// Resolver reading a local Maven 2 layout repository such as
/// `~/.m2/repository`.
///
/// Dependencies are the direct `compile`/`runtime`/`provided` dependencies
/// listed in the artifact's POM; versions must be literal. An artifact
/// without a POM cannot be resolved.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    root: PathBuf,
}

impl LocalRepositoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// POM of `artifact`: `{name}-{version}.pom` beside the artifact file,
    /// whatever its classifier and type.
    pub fn pom_path(&self, artifact: &ResolvedArtifact) -> PathBuf {
        let pom_name = format!("{}-{}.pom", artifact.coordinate.name, artifact.coordinate.version);
        match artifact.file.parent() {
            Some(dir) => dir.join(pom_name),
            None => PathBuf::from(pom_name),
        }
    }

    fn lookup(&self, coordinate: &ExtensionCoordinate) -> ArtifactResolution {
        let file = self.root.join(coordinate.repository_path());
        if file.is_file() {
            ArtifactResolution::Resolved(ResolvedArtifact {
                coordinate: coordinate.clone(),
                file,
                repository: None,
            })
        } else {
            ArtifactResolution::Missing
        }
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve_artifact(
        &self,
        coordinate: &ExtensionCoordinate,
        _repositories: &[RemoteRepository],
    ) -> ArtifactResolution {
        self.lookup(coordinate)
    }

    fn resolve_dependencies(
        &self,
        artifact: &ResolvedArtifact,
        _repositories: &[RemoteRepository],
    ) -> Vec<DependencyResolution> {
        let pom = self.pom_path(artifact);
        let content = match fs::read_to_string(&pom) {
            Ok(content) => content,
            Err(e) => {
                return vec![DependencyResolution {
                    coordinate: artifact.coordinate.clone(),
                    result: ArtifactResolution::Failed(vec![format!(
                        "{}: {}",
                        pom.display(),
                        e
                    )]),
                }]
            }
        };

        match direct_dependencies(&content) {
            Ok(dependencies) => dependencies
                .into_iter()
                .map(|coordinate| {
                    let result = if coordinate.version.contains("${") {
                        ArtifactResolution::Failed(vec![format!(
                            "unresolved version expression '{}'",
                            coordinate.version
                        )])
                    } else {
                        self.lookup(&coordinate)
                    };
                    DependencyResolution { coordinate, result }
                })
                .collect(),
            Err(reason) => vec![DependencyResolution {
                coordinate: artifact.coordinate.clone(),
                result: ArtifactResolution::Failed(vec![format!("{}: {}", pom.display(), reason)]),
            }],
        }
    }
}

fn direct_dependencies(pom: &str) -> std::result::Result<Vec<ExtensionCoordinate>, String> {
    let doc = roxmltree::Document::parse(pom).map_err(|e| e.to_string())?;
    let Some(list) = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "dependencies")
    else {
        return Ok(Vec::new());
    };

    let mut dependencies = Vec::new();
    for dependency in list
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "dependency")
    {
        let scope = text(dependency, "scope").unwrap_or_else(|| "compile".to_string());
        let optional = text(dependency, "optional").as_deref() == Some("true");
        if optional || !matches!(scope.as_str(), "compile" | "runtime" | "provided") {
            continue;
        }
        let (Some(group), Some(name), Some(version)) = (
            text(dependency, "groupId"),
            text(dependency, "artifactId"),
            text(dependency, "version"),
        ) else {
            return Err("dependency without groupId, artifactId or version".to_string());
        };
        let mut coordinate = ExtensionCoordinate::new(group, name, version);
        if let Some(package_type) = text(dependency, "type") {
            coordinate = coordinate.with_package_type(package_type);
        }
        if let Some(classifier) = text(dependency, "classifier") {
            coordinate = coordinate.with_classifier(classifier);
        }
        dependencies.push(coordinate);
    }
    Ok(dependencies)
}
