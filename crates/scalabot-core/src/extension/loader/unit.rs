//! Code units: one code-loading boundary each.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::extension::coordinate::ExtensionCoordinate;
use crate::extension::{is_native_library, is_package_archive, ExtensionError, Result};

/// A set of code roots with an optional parent.
///
/// Roots are directories or native library files. A unit without a parent
/// is parented to the host process itself.
#[derive(Debug)]
pub struct CodeUnit {
    name: String,
    roots: Vec<PathBuf>,
    parent: Option<Arc<CodeUnit>>,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>, roots: Vec<PathBuf>, parent: Option<Arc<CodeUnit>>) -> Self {
        Self {
            name: name.into(),
            roots,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn parent(&self) -> Option<&Arc<CodeUnit>> {
        self.parent.as_ref()
    }

    /// Resources named `name` in this unit's own roots, parent excluded.
    pub fn find_resources(&self, name: &str) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|root| root.is_dir())
            .map(|root| root.join(name))
            .filter(|candidate| candidate.is_file())
            .collect()
    }

    /// Resources named `name` visible from this unit: the parent's first,
    /// then its own.
    pub fn resources(&self, name: &str) -> Vec<PathBuf> {
        let mut found = match &self.parent {
            Some(parent) => parent.resources(name),
            None => Vec::new(),
        };
        found.extend(self.find_resources(name));
        found
    }

    /// Native libraries of this unit's own roots, in a stable order.
    pub fn native_libraries(&self) -> Vec<PathBuf> {
        let mut libraries = Vec::new();
        for root in &self.roots {
            if root.is_file() && is_native_library(root) {
                libraries.push(root.clone());
            } else if root.is_dir() {
                collect_native_libraries(root, &mut libraries);
            }
        }
        libraries
    }
}

fn collect_native_libraries(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_native_libraries(&path, out);
        } else if is_native_library(&path) {
            out.push(path);
        }
    }
}

/// Directory a package is unpacked into:
/// `{group}_{name}_{version}-{first 16 hex digits of sha256(origin)}`.
pub fn unpack_dir_name(coordinate: &ExtensionCoordinate, origin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!(
        "{}_{}_{}-{}",
        coordinate.group,
        coordinate.name,
        coordinate.version,
        &digest[..16]
    )
}

/// Turn a package file into a code root.
///
/// Directories and native libraries are used in place. Archives are
/// extracted to `{target_dir}/{index}-{file name}`, replacing whatever a
/// previous run left there. `index` is the file's position in its unit, so
/// same-named archives of one unit never share a target.
pub fn materialize(path: &Path, target_dir: &Path, index: usize) -> Result<PathBuf> {
    if path.is_dir() || (path.is_file() && is_native_library(path)) {
        return Ok(path.to_path_buf());
    }
    if !path.exists() {
        return Err(ExtensionError::InvalidPackage {
            path: path.display().to_string(),
            reason: "file does not exist".to_string(),
        });
    }
    if !is_package_archive(path) {
        return Err(ExtensionError::InvalidPackage {
            path: path.display().to_string(),
            reason: "unsupported package format".to_string(),
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    let target = target_dir.join(format!("{}-{}", index, file_name));
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::create_dir_all(&target)?;

    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    archive.extract(&target)?;
    debug!(package = %path.display(), target = %target.display(), "Unpacked extension archive");
    Ok(target)
}
